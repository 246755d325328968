use std::sync::Arc;

use regex::Regex;

use super::compose::{derive_title, is_advisory};
use crate::rules::RuleSet;
use crate::transcript::types::Turn;

const REFERENCE_MAX_CHARS: usize = 80;
const FALLBACK_THEME_MAX_CHARS: usize = 40;

/// What a report request points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// "this", "the current answer": the most recent advisory answer.
    Immediate,
    /// A named topic. `title_only` is set when the user named the topic
    /// explicitly next to a demonstrative, so only an answer titled after
    /// it may be bound.
    Topic { text: String, title_only: bool },
    /// No recognizable reference.
    Unspecified,
}

impl Reference {
    /// The topic string, or `None` for "the immediately preceding answer".
    pub fn topic(&self) -> Option<&str> {
        match self {
            Reference::Topic { text, .. } => Some(text),
            _ => None,
        }
    }
}

fn within_bounds(text: &str, max: usize) -> bool {
    let n = text.chars().count();
    (1..=max).contains(&n)
}

fn first_capture<'m>(re: &Regex, message: &'m str) -> Option<&'m str> {
    re.captures(message)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
}

/// Locates the earlier turn a report request refers to.
pub struct ReferenceResolver {
    rules: Arc<RuleSet>,
}

impl ReferenceResolver {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    /// Drop a trailing "..., and this" and collapse repeated connectives.
    fn normalize(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        let stripped = self
            .rules
            .trailing_demonstrative
            .replace(trimmed, "")
            .trim()
            .to_string();
        let core = if stripped.is_empty() {
            trimmed.to_string()
        } else {
            stripped
        };
        self.rules.normalize_connective(&core)
    }

    fn is_bare_demonstrative(&self, text: &str) -> bool {
        self.rules.bare_demonstrative.is_match(text.trim())
    }

    /// Parse a report request into what it points at.
    pub fn extract(&self, message: &str) -> Reference {
        let trimmed = message.trim();
        if trimmed.chars().count() < 3 {
            return Reference::Unspecified;
        }
        if self
            .rules
            .immediate_reference
            .iter()
            .any(|re| re.is_match(trimmed))
        {
            return Reference::Immediate;
        }

        for re in &self.rules.explicit_topic {
            if let Some(raw) = first_capture(re, trimmed) {
                let text = self.normalize(raw);
                if self.is_bare_demonstrative(&text) {
                    return Reference::Immediate;
                }
                if within_bounds(&text, REFERENCE_MAX_CHARS) {
                    return Reference::Topic {
                        text,
                        title_only: true,
                    };
                }
            }
        }

        for re in &self.rules.topic_reference {
            if let Some(raw) = first_capture(re, trimmed) {
                if self.is_bare_demonstrative(raw) {
                    return Reference::Immediate;
                }
                let text = self.normalize(raw);
                if self.is_bare_demonstrative(&text) {
                    return Reference::Immediate;
                }
                if within_bounds(&text, REFERENCE_MAX_CHARS) {
                    return Reference::Topic {
                        text,
                        title_only: false,
                    };
                }
            }
        }

        Reference::Unspecified
    }

    /// Topic string of a report request, `None` meaning the most recent answer.
    pub fn extract_reference(&self, message: &str) -> Option<String> {
        self.extract(message).topic().map(str::to_string)
    }

    /// Theme of a "summarize the discussion about X" request.
    pub fn extract_discussion_theme(&self, message: &str) -> Option<String> {
        let trimmed = message.trim();
        let clean = |s: &str| {
            s.trim()
                .trim_end_matches(|c: char| c.is_whitespace() || "、。,.".contains(c))
                .to_string()
        };

        for re in &self.rules.discussion_theme {
            if let Some(raw) = first_capture(re, trimmed) {
                let theme = clean(raw);
                if within_bounds(&theme, REFERENCE_MAX_CHARS)
                    && !self.is_generic_word(&theme)
                {
                    return Some(theme);
                }
            }
        }

        let phrase = first_capture(&self.rules.theme_fallback, trimmed)?;
        phrase
            .split(|c: char| c.is_whitespace() || "、。,".contains(c))
            .filter(|w| !w.is_empty() && !self.is_generic_word(w))
            .last()
            .map(clean)
            .filter(|w| within_bounds(w, FALLBACK_THEME_MAX_CHARS))
    }

    fn is_generic_word(&self, word: &str) -> bool {
        self.rules
            .generic_theme_words
            .iter()
            .any(|g| g.eq_ignore_ascii_case(word))
    }

    /// Most recent answer whose title (or, unless `title_only`, whose body)
    /// contains `reference`, case-insensitively. Echo, receipt and
    /// bootstrap turns are never returned.
    pub fn find_turn_by_reference<'t>(
        &self,
        turns: &'t [Turn],
        reference: &str,
        title_only: bool,
    ) -> Option<&'t Turn> {
        let needle = self.rules.strip_connective(reference).to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let eligible = || turns.iter().rev().filter(|t| is_advisory(t, &self.rules));

        if let Some(hit) = eligible().find(|t| {
            derive_title(&t.content, &self.rules)
                .to_lowercase()
                .contains(&needle)
        }) {
            return Some(hit);
        }
        if title_only {
            return None;
        }
        eligible().find(|t| t.content.to_lowercase().contains(&needle))
    }

    /// The most recent advisory answer.
    pub fn latest_answer<'t>(&self, turns: &'t [Turn]) -> Option<&'t Turn> {
        turns.iter().rev().find(|t| is_advisory(t, &self.rules))
    }

    pub fn title_of(&self, turn: &Turn) -> String {
        derive_title(&turn.content, &self.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::compose;
    use crate::transcript::types::Role;
    use chrono::Utc;

    fn english() -> ReferenceResolver {
        ReferenceResolver::new(Arc::new(RuleSet::english().unwrap()))
    }

    fn japanese() -> ReferenceResolver {
        ReferenceResolver::new(Arc::new(RuleSet::japanese().unwrap()))
    }

    fn answers(contents: &[&str]) -> Vec<Turn> {
        contents
            .iter()
            .enumerate()
            .map(|(i, c)| Turn {
                order_index: i as u64 + 1,
                role: Role::Advisor,
                content: c.to_string(),
                created_at: Utc::now(),
                round_index: 1,
                topic_tag: None,
                hint: None,
            })
            .collect()
    }

    #[test]
    fn test_demonstratives_mean_latest_answer() {
        let r = english();
        for msg in [
            "turn this into a report",
            "Please turn the current answer into a document",
            "make it into a PDF",
            "create a report of this please",
        ] {
            assert_eq!(r.extract(msg), Reference::Immediate, "{msg}");
            assert_eq!(r.extract_reference(msg), None);
        }
    }

    #[test]
    fn test_topic_before_content_keyword() {
        let r = english();
        assert_eq!(
            r.extract_reference("turn the pricing strategy content into a report"),
            Some("pricing strategy".to_string())
        );
        assert_eq!(
            r.extract("turn the pricing strategy content into a report"),
            Reference::Topic {
                text: "pricing strategy".to_string(),
                title_only: false
            }
        );
    }

    #[test]
    fn test_other_topic_phrasings() {
        let r = english();
        assert_eq!(
            r.extract_reference("turn the earlier SWOT analysis into a report"),
            Some("SWOT analysis".to_string())
        );
        assert_eq!(
            r.extract_reference("please make the content of the hiring plan into a document"),
            Some("hiring plan".to_string())
        );
        assert_eq!(
            r.extract_reference("Could you write a report about cost reduction, please?"),
            Some("cost reduction".to_string())
        );
        assert_eq!(r.extract_reference("please create a report"), None);
        assert_eq!(r.extract("please create a report"), Reference::Unspecified);
    }

    #[test]
    fn test_explicit_topic_with_demonstrative_is_title_only() {
        let r = english();
        assert_eq!(
            r.extract("Regarding long-term investment decisions, turn this into a report"),
            Reference::Topic {
                text: "long-term investment decisions".to_string(),
                title_only: true
            }
        );
    }

    #[test]
    fn test_trailing_demonstrative_is_stripped() {
        let r = english();
        assert_eq!(
            r.extract_reference("make the supplier contracts and this into a report"),
            Some("supplier contracts".to_string())
        );
    }

    #[test]
    fn test_overlong_reference_is_discarded() {
        let r = english();
        let msg = format!("create a report about {}", "very ".repeat(30));
        assert_eq!(r.extract_reference(&msg), None);
    }

    #[test]
    fn test_discussion_theme() {
        let r = english();
        assert_eq!(
            r.extract_discussion_theme("summarize the discussion about pricing into a report"),
            Some("pricing".to_string())
        );
        assert_eq!(
            r.extract_discussion_theme(
                "please summarize the discussion about unit prices and produce a report"
            ),
            Some("unit prices".to_string())
        );
        assert_eq!(
            r.extract_discussion_theme("summarize our pricing talk into a report"),
            Some("pricing".to_string())
        );
        assert_eq!(
            r.extract_discussion_theme("summarize everything into a report"),
            None
        );
    }

    #[test]
    fn test_find_prefers_title_then_body() {
        let r = english();
        let turns = answers(&[
            "Pricing strategy overview\n\n1. Value-based pricing",
            "Marketing plan\n\nRevisit the pricing strategy later.",
        ]);
        let hit = r
            .find_turn_by_reference(&turns, "pricing strategy", false)
            .unwrap();
        assert_eq!(hit.order_index, 1);

        let body_only = r.find_turn_by_reference(&turns, "revisit", false).unwrap();
        assert_eq!(body_only.order_index, 2);
        assert!(r.find_turn_by_reference(&turns, "revisit", true).is_none());
        assert!(r.find_turn_by_reference(&turns, "SWOT", false).is_none());
    }

    #[test]
    fn test_find_most_recent_title_match() {
        let r = english();
        let turns = answers(&["Pricing v1\nold", "Pricing v2\nnew"]);
        let hit = r.find_turn_by_reference(&turns, "pricing", true).unwrap();
        assert_eq!(hit.order_index, 2);
    }

    #[test]
    fn test_find_skips_echo_and_receipt() {
        let r = english();
        let rules = RuleSet::english().unwrap();
        let turns = answers(&[
            "Long-term investment\n\n1. Strategic fit\n2. ROI",
            &compose::echo("about long-term investment", &rules),
            &compose::receipt("about long-term investment", &rules),
        ]);
        let hit = r
            .find_turn_by_reference(&turns, "long-term investment", false)
            .unwrap();
        assert_eq!(hit.order_index, 1);

        let only_synthetic = &turns[1..];
        assert!(r
            .find_turn_by_reference(only_synthetic, "long-term investment", false)
            .is_none());
        assert!(r.latest_answer(only_synthetic).is_none());
        assert_eq!(r.latest_answer(&turns).unwrap().order_index, 1);
    }

    #[test]
    fn test_japanese_extraction() {
        let r = japanese();
        assert_eq!(r.extract_reference("これをレポートにして下さい"), None);
        assert_eq!(r.extract_reference("この内容をレポートに"), None);
        assert_eq!(r.extract_reference("今の回答をレポートに"), None);
        assert_eq!(
            r.extract_reference("生産性向上の提案の内容をレポートにして下さい"),
            Some("生産性向上の提案".to_string())
        );
        assert_eq!(
            r.extract_reference("先ほどのSWOT分析をレポートに"),
            Some("SWOT分析".to_string())
        );
        assert_eq!(
            r.extract_reference("現状分析についてのレポートをお願いします"),
            Some("現状分析".to_string())
        );
        assert_eq!(
            r.extract("長期的視点での投資判断について、これをレポートにして"),
            Reference::Topic {
                text: "長期的視点での投資判断".to_string(),
                title_only: true
            }
        );
        assert_eq!(
            r.extract_discussion_theme("単価の話だけまとめてレポートに"),
            Some("単価".to_string())
        );
    }

    #[test]
    fn test_japanese_title_only_rejects_passing_mention() {
        let r = japanese();
        let turns = answers(&[
            "設備維持費の削減に向けた提案\n\n本稿では長期的視点での投資判断についても触れます。\n1. 施策",
        ]);
        assert!(r
            .find_turn_by_reference(&turns, "長期的視点での投資判断", true)
            .is_none());
        assert!(r
            .find_turn_by_reference(&turns, "長期的視点での投資判断", false)
            .is_some());
    }
}

//! Synthetic advisor turns (the clarifying echo and the "report created"
//! receipt) and the filters that keep them out of reference resolution
//! and exported report content.

use super::ledger::PendingKind;
use crate::rules::{fill, match_template, RuleSet};
use crate::transcript::types::{Role, Turn};

const TITLE_MAX_CHARS: usize = 60;
const RAW_SUBJECT_MAX_CHARS: usize = 40;
const SUBJECT_KEY: &str = "{subject}";

fn take_chars(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Strip heading and emphasis markup from a single line.
fn strip_markup(line: &str) -> &str {
    let line = line.trim().trim_start_matches('#').trim();
    for wrap in ["**", "__"] {
        if let Some(inner) = line
            .strip_prefix(wrap)
            .and_then(|rest| rest.strip_suffix(wrap))
        {
            return inner.trim();
        }
    }
    line
}

/// Title of an advisor answer: its first line without markup, at most
/// 60 characters.
pub fn derive_title(content: &str, rules: &RuleSet) -> String {
    let first_line = content.trim().lines().next().unwrap_or("");
    let title = strip_markup(first_line);
    if title.is_empty() {
        return rules.phrasing.default_title.to_string();
    }
    if title.chars().count() <= TITLE_MAX_CHARS {
        title.to_string()
    } else {
        format!("{}...", take_chars(title, TITLE_MAX_CHARS - 3))
    }
}

fn truncate_raw(message: &str, rules: &RuleSet) -> String {
    let trimmed = message.trim();
    if trimmed.chars().count() > RAW_SUBJECT_MAX_CHARS {
        format!(
            "{}{}",
            take_chars(trimmed, RAW_SUBJECT_MAX_CHARS - 3),
            rules.phrasing.ellipsis
        )
    } else {
        trimmed.to_string()
    }
}

/// Subject quoted by both the echo and the receipt for a pending request.
///
/// Priority: explicit topic (with one connective) > bound answer's title >
/// the raw user message. A request that pointed at "this answer" while no
/// answer existed yet is quoted as the current answer.
pub fn subject(kind: &PendingKind, raw_message: &str, rules: &RuleSet) -> String {
    match kind {
        PendingKind::DirectEcho {
            topic: Some(topic), ..
        } if !topic.trim().is_empty() => rules.with_connective(topic),
        PendingKind::DirectEcho {
            target: Some(target),
            ..
        } => target.title.clone(),
        PendingKind::DirectEcho {
            immediate: true, ..
        } => rules.phrasing.current_answer.to_string(),
        PendingKind::DirectEcho { .. } => {
            let raw = truncate_raw(raw_message, rules);
            if raw.is_empty() {
                rules.phrasing.current_answer.to_string()
            } else {
                raw
            }
        }
        PendingKind::DiscussionSummary { theme: Some(theme) } => {
            fill(rules.phrasing.discussion_subject, "{theme}", theme)
        }
        PendingKind::DiscussionSummary { theme: None } => {
            rules.phrasing.discussion_fallback.to_string()
        }
        PendingKind::UserTopicFallback { topic } => rules.with_connective(topic),
    }
}

pub fn echo(subject: &str, rules: &RuleSet) -> String {
    fill(rules.phrasing.echo_template, SUBJECT_KEY, subject)
}

pub fn receipt(subject: &str, rules: &RuleSet) -> String {
    fill(rules.phrasing.receipt_template, SUBJECT_KEY, subject)
}

pub fn is_echo(content: &str, rules: &RuleSet) -> bool {
    match_template(rules.phrasing.echo_template, SUBJECT_KEY, content.trim()).is_some()
}

pub fn is_receipt(content: &str, rules: &RuleSet) -> bool {
    match_template(rules.phrasing.receipt_template, SUBJECT_KEY, content.trim()).is_some()
}

/// Whether a turn carries real advisory content: an advisor turn that is
/// neither bootstrap, echo, nor receipt.
pub fn is_advisory(turn: &Turn, rules: &RuleSet) -> bool {
    turn.role == Role::Advisor
        && !turn.is_bootstrap()
        && !turn.content.trim().is_empty()
        && !is_echo(&turn.content, rules)
        && !is_receipt(&turn.content, rules)
}

/// Whether a turn belongs in exported report content (either role).
pub fn is_exportable(turn: &Turn, rules: &RuleSet) -> bool {
    match turn.role {
        Role::Advisor => is_advisory(turn, rules),
        Role::User => !turn.content.trim().is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ledger::TargetTurn;

    fn en() -> RuleSet {
        RuleSet::english().unwrap()
    }

    #[test]
    fn test_derive_title_first_line_without_markup() {
        let rules = en();
        assert_eq!(
            derive_title("## Pricing strategy overview\n\n1. Costs", &rules),
            "Pricing strategy overview"
        );
        assert_eq!(derive_title("**Bold title**\nbody", &rules), "Bold title");
        assert_eq!(derive_title("   ", &rules), "Advisor report");
    }

    #[test]
    fn test_derive_title_truncates_long_lines() {
        let rules = en();
        let long = "x".repeat(80);
        let title = derive_title(&long, &rules);
        assert_eq!(title.chars().count(), 60);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_subject_priority() {
        let rules = en();
        let target = Some(TargetTurn {
            order_index: 4,
            title: "Pricing strategy overview".to_string(),
        });
        let with_topic = PendingKind::DirectEcho {
            topic: Some("regarding pricing".to_string()),
            target: target.clone(),
            immediate: false,
        };
        assert_eq!(subject(&with_topic, "", &rules), "about pricing");

        let with_target = PendingKind::DirectEcho {
            topic: None,
            target,
            immediate: false,
        };
        assert_eq!(
            subject(&with_target, "", &rules),
            "Pricing strategy overview"
        );

        let bare = PendingKind::DirectEcho {
            topic: None,
            target: None,
            immediate: false,
        };
        let raw = "could you please produce a report for the board meeting next week";
        let s = subject(&bare, raw, &rules);
        assert_eq!(s.chars().count(), 38);
        assert!(s.ends_with('…'));

        let immediate = PendingKind::DirectEcho {
            topic: None,
            target: None,
            immediate: true,
        };
        assert_eq!(subject(&immediate, raw, &rules), "the current answer");
    }

    #[test]
    fn test_echo_and_receipt_are_recognized_by_shape() {
        let rules = en();
        let e = echo("about pricing", &rules);
        let r = receipt("about pricing", &rules);
        assert!(e.starts_with("«about pricing»"));
        assert_eq!(r, "«about pricing» — report created.");
        assert!(is_echo(&e, &rules));
        assert!(!is_receipt(&e, &rules));
        assert!(is_receipt(&r, &rules));
        assert!(!is_echo(&r, &rules));
    }

    #[test]
    fn test_free_text_mentioning_templates_is_not_synthetic() {
        let rules = en();
        let prose = "Once you confirm I will say «Pricing» — report created. Then we continue.";
        assert!(!is_receipt(prose, &rules));
        assert!(!is_echo("# Pricing report\n\n1. Intro", &rules));
    }

    #[test]
    fn test_japanese_echo_shape() {
        let rules = RuleSet::japanese().unwrap();
        let e = echo("長期的視点での投資判断について", &rules);
        assert_eq!(
            e,
            "「長期的視点での投資判断について」のレポート（資料）をお作りしますね。よろしければ「はい」や「お願いします」と送信してください。"
        );
        assert!(is_echo(&e, &rules));
        assert!(is_receipt("「売上分析」のレポートを作成しました。", &rules));
    }
}

//! Locale rule tables: every pattern and fixed phrasing the advisor matches
//! against or emits. Built once at startup and shared behind an `Arc`.

use std::str::FromStr;

use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    English,
    Japanese,
}

impl FromStr for Locale {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Locale::English),
            "ja" | "jp" | "japanese" => Ok(Locale::Japanese),
            other => Err(anyhow::anyhow!("unknown locale '{}' (expected en or ja)", other)),
        }
    }
}

/// Where the "about" word sits relative to a topic.
#[derive(Debug, Clone, Copy)]
pub enum Connective {
    /// "about pricing"; the first entry is the canonical form.
    Prefix(&'static [&'static str]),
    /// "価格について"
    Suffix(&'static str),
}

/// Fixed wording. Templates use `{subject}`, `{theme}`, `{category}`,
/// `{round}` and `{title}` placeholders.
#[derive(Debug, Clone)]
pub struct Phrasing {
    pub echo_template: &'static str,
    pub receipt_template: &'static str,
    pub current_answer: &'static str,
    pub discussion_subject: &'static str,
    pub discussion_fallback: &'static str,
    pub default_title: &'static str,
    pub greeting: &'static str,
    pub fallback_reply: &'static str,
    pub empty_reply: &'static str,
    pub category_follow_up: &'static str,
    pub free_input_reply: &'static str,
    pub no_conversation: &'static str,
    pub step_report_title: &'static str,
    pub user_label: &'static str,
    pub advisor_label: &'static str,
    pub ellipsis: &'static str,
}

#[derive(Debug, Clone)]
pub struct Category {
    pub label: &'static str,
    pub subtopics: &'static [&'static str],
}

#[derive(Debug, Clone)]
pub struct RoundBrief {
    pub title: &'static str,
    pub goal: &'static str,
}

pub struct RuleSet {
    pub locale: Locale,
    pub phrasing: Phrasing,
    pub categories: Vec<Category>,
    /// Category whose selection asks for free text instead of subtopics.
    pub open_category: &'static str,
    pub rounds: Vec<RoundBrief>,
    pub connective: Connective,
    pub(crate) confirmation: Vec<Regex>,
    pub(crate) discussion_summary: Vec<Regex>,
    pub(crate) report_request: Vec<Regex>,
    /// Openers of a plain question; such messages are never report requests.
    pub(crate) question_opener: Vec<Regex>,
    pub(crate) immediate_reference: Vec<Regex>,
    pub(crate) explicit_topic: Vec<Regex>,
    pub(crate) topic_reference: Vec<Regex>,
    pub(crate) bare_demonstrative: Regex,
    pub(crate) trailing_demonstrative: Regex,
    pub(crate) discussion_theme: Vec<Regex>,
    pub(crate) theme_fallback: Regex,
    pub(crate) generic_theme_words: &'static [&'static str],
}

fn compile(patterns: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

/// Split a one-placeholder template into the text before and after it.
fn split_template<'t>(template: &'t str, key: &str) -> Option<(&'t str, &'t str)> {
    let at = template.find(key)?;
    Some((&template[..at], &template[at + key.len()..]))
}

/// Fill one placeholder.
pub fn fill(template: &str, key: &str, value: &str) -> String {
    template.replace(key, value)
}

/// Inverse of [`fill`]: if `content` has exactly the template's shape,
/// return the text standing in for `key`.
pub fn match_template<'c>(template: &str, key: &str, content: &'c str) -> Option<&'c str> {
    let (head, tail) = split_template(template, key)?;
    if content.len() < head.len() + tail.len() {
        return None;
    }
    let middle = content.strip_prefix(head)?.strip_suffix(tail)?;
    if middle.trim().is_empty() {
        None
    } else {
        Some(middle)
    }
}

impl RuleSet {
    pub fn for_locale(locale: Locale) -> Result<Self, regex::Error> {
        match locale {
            Locale::English => Self::english(),
            Locale::Japanese => Self::japanese(),
        }
    }

    pub fn english() -> Result<Self, regex::Error> {
        const DOC: &str = r"(?:reports?|documents?|pdfs?|write-?ups?)";
        let into_doc = format!(r"\s+(?:into|as|in)\s+(?:an?\s+)?{DOC}\b");

        Ok(Self {
            locale: Locale::English,
            phrasing: Phrasing {
                echo_template: "«{subject}» — shall I turn this into a report? \
                                Reply \"yes\" or \"please do\" to confirm.",
                receipt_template: "«{subject}» — report created.",
                current_answer: "the current answer",
                discussion_subject: "the discussion about {theme}",
                discussion_fallback: "the discussion so far",
                default_title: "Advisor report",
                greeting: "Hello! I'm your business advisor. Let's start with where your \
                           company stands today. What is the main challenge you are facing?",
                fallback_reply: "Something went wrong while preparing an answer. \
                                 Please try again in a little while.",
                empty_reply: "I couldn't get an answer this time.",
                category_follow_up: "Let's look at «{category}». Tell me more: \
                                     which of these is closest to your challenge?",
                free_input_reply: "Understood. Please describe your challenge freely.",
                no_conversation: "(no conversation)",
                step_report_title: "STEP {round} {title} consensus report",
                user_label: "User",
                advisor_label: "Advisor",
                ellipsis: "…",
            },
            categories: vec![
                Category {
                    label: "Stagnant sales",
                    subtopics: &["Customer acquisition", "Pricing", "Repeat business", "Sales channels"],
                },
                Category {
                    label: "Cost reduction",
                    subtopics: &["Procurement", "Fixed costs", "Energy", "Outsourcing"],
                },
                Category {
                    label: "Hiring & talent",
                    subtopics: &["Recruiting", "Retention", "Training", "Compensation"],
                },
                Category {
                    label: "Workstyle & organization",
                    subtopics: &["Remote work", "Team structure", "Evaluation", "Communication"],
                },
                Category {
                    label: "Operational efficiency",
                    subtopics: &["Process mapping", "Automation", "Inventory", "Quality"],
                },
                Category {
                    label: "DX initiatives",
                    subtopics: &["Tool selection", "Data utilization", "IT literacy", "Security"],
                },
                Category {
                    label: "Legal & risk",
                    subtopics: &["Contracts", "Compliance", "Intellectual property", "Disputes"],
                },
                Category {
                    label: "Other",
                    subtopics: &[],
                },
            ],
            open_category: "Other",
            rounds: vec![
                RoundBrief {
                    title: "Situation",
                    goal: "Understand the company's current state and the user's main concern.",
                },
                RoundBrief {
                    title: "Challenges",
                    goal: "List and prioritize the concrete challenges.",
                },
                RoundBrief {
                    title: "Root causes",
                    goal: "Identify the causes behind the top-priority challenges.",
                },
                RoundBrief {
                    title: "Options",
                    goal: "Propose and compare candidate measures.",
                },
                RoundBrief {
                    title: "Action plan",
                    goal: "Agree on next steps, owners and milestones.",
                },
            ],
            connective: Connective::Prefix(&["about", "regarding", "concerning"]),
            confirmation: compile(&[
                r"(?i)^(?:yes|yeah|yep|yup|ok|okay|sure|please|please do|please go ahead|go ahead|do it|yes please|sounds good|fine|fine by me|that[’']s fine|that is fine|no problem|confirmed?|absolutely|of course)[\s.!]*$",
            ])?,
            discussion_summary: compile(&[
                &format!(r"(?i)\b(?:summari[sz]e|organi[sz]e|consolidate|condense|recap)\b.*\b{DOC}\b"),
                &format!(r"(?i)\b(?:discussions?|conversations?|exchanges?|talks?)\s+(?:about|on|regarding|around)\s+.+{into_doc}"),
                &format!(r"(?i)\bonly\s+the\s+(?:parts?|bits?)\s+(?:about|on|regarding)\s+.+\b{DOC}\b"),
            ])?,
            report_request: compile(&[
                &format!(r"(?i)\b(?:turn|make|convert|put|compile)\b.*{into_doc}"),
                &format!(r"(?i)\b(?:create|produce|generate|write|prepare|draft|give|output|export|build)\s+(?:me\s+|us\s+)?(?:an?\s+|the\s+|this\s+|that\s+)?(?:short\s+|brief\s+|full\s+)?{DOC}\b"),
                r"(?i)\bwrite\s+(?:this|that|it)\s+up\b",
            ])?,
            question_opener: compile(&[
                r"(?i)^(?:how|what|why|when|where|which|who|whose|is|are|was|were|does|do|did|should)\b",
            ])?,
            immediate_reference: compile(&[
                &format!(r"(?i)^(?:please\s+)?(?:can\s+you\s+)?(?:turn|make|convert|put)\s+(?:this|that|it|this\s+answer|that\s+answer|the\s+(?:current|last|latest|previous)\s+answer|your\s+(?:last\s+)?answer|the\s+answer\s+above){into_doc}"),
                r"(?i)^(?:please\s+)?(?:create|make|produce|write|prepare)\s+(?:an?\s+)?(?:report|document|pdf|write-?up)\s+(?:of|from|for|on)\s+(?:this|that|it|the\s+(?:current|last)\s+answer)[\s.!,]*(?:please)?[\s.!]*$",
            ])?,
            explicit_topic: compile(&[
                &format!(r"(?i)^(?:please\s+)?(?:regarding|about|as\s+for|concerning|on)\s+(.+?)\s*[,;:]\s*(?:please\s+)?(?:can\s+you\s+)?(?:turn|make|convert|put)\s+(?:this|that|it){into_doc}"),
            ])?,
            topic_reference: compile(&[
                &format!(r"(?i)\b(?:earlier|previous|prior)\s+(.+?)(?:\s+(?:answer|content|contents|discussion|part|section))?{into_doc}"),
                &format!(r"(?i)\b(?:turn|make|convert|put)\s+(?:the\s+)?(?:content|contents|part|section|answer)\s+(?:of|about|on|regarding)\s+(?:the\s+)?(.+?){into_doc}"),
                &format!(r"(?i)\b(?:turn|make|convert|put)\s+(?:the\s+)?(.+?)\s+(?:content|contents|answer|part|section){into_doc}"),
                r"(?i)\b(?:report|document|pdf|write-?up)\s+(?:about|on|regarding|covering|concerning)\s+(?:the\s+)?(.+?)[\s.!?]*(?:,?\s*please[\s.!?]*)?$",
                &format!(r"(?i)\b(?:turn|make|convert|put)\s+(?:the\s+)?(.+?){into_doc}"),
            ])?,
            bare_demonstrative: Regex::new(
                r"(?i)^(?:this|that|it|these|those|this one|that one|this answer|that answer|the answer|the current answer)$",
            )?,
            trailing_demonstrative: Regex::new(
                r"(?i)(?:\s*[,;]\s*|\s+)(?:and\s+)?(?:this|that|it)(?:\s+(?:answer|content|one))?\s*$",
            )?,
            discussion_theme: compile(&[
                &format!(r"(?i)\b(?:discussions?|conversations?|exchanges?|talks?|parts?|bits?|points?)\s+(?:about|on|regarding|around|concerning)\s+(?:the\s+)?(.+?)(?:\s*[,;]|\s+and\s|{into_doc}|[\s.!?]*$)"),
                &format!(r"(?i)\b(?:about|on|regarding|concerning)\s+(?:the\s+)?(.+?){into_doc}"),
            ])?,
            theme_fallback: Regex::new(&format!(
                r"(?i)\b(?:summari[sz]e|organi[sz]e|consolidate|condense|recap)\s+(?:the\s+|our\s+|my\s+|all\s+)?(.+?){into_doc}"
            ))?,
            generic_theme_words: &[
                "everything", "it", "this", "that", "all", "what", "we", "us", "so", "far", "up",
                "have", "has", "discussed", "discussion", "discussions", "conversation",
                "conversations", "talk", "talks", "exchange", "exchanges", "notes", "points",
            ],
        })
    }

    /// Phrasing of the original Japanese product.
    pub fn japanese() -> Result<Self, regex::Error> {
        Ok(Self {
            locale: Locale::Japanese,
            phrasing: Phrasing {
                echo_template: "「{subject}」のレポート（資料）をお作りしますね。\
                                よろしければ「はい」や「お願いします」と送信してください。",
                receipt_template: "「{subject}」のレポートを作成しました。",
                current_answer: "今の回答",
                discussion_subject: "{theme}に関する議論のまとめ",
                discussion_fallback: "これまでの議論のまとめ",
                default_title: "AIレポート",
                greeting: "こんにちは！AIコンサルティングアシスタントです。まず、貴社の現状について\
                           お聞かせください。現在直面している主な課題は何ですか？",
                fallback_reply: "AI処理中にエラーが発生しました。しばらく経ってから再度お試しください。",
                empty_reply: "AI応答の取得に失敗しました。",
                category_follow_up: "「{category}」についてですね。さらに詳しくお聞かせください。\
                                     具体的にはどのような課題でしょうか？",
                free_input_reply: "承知しました。どのような課題でしょうか？自由に入力してください。",
                no_conversation: "（会話なし）",
                step_report_title: "STEP {round} {title} コンセンサスレポート",
                user_label: "ユーザー",
                advisor_label: "AI",
                ellipsis: "…",
            },
            categories: vec![
                Category {
                    label: "売上の伸び悩み",
                    subtopics: &["新規顧客の獲得", "価格設定", "リピート率", "販売チャネル"],
                },
                Category {
                    label: "コスト削減",
                    subtopics: &["仕入れ", "固定費", "光熱費", "外注費"],
                },
                Category {
                    label: "人材・採用",
                    subtopics: &["採用", "定着", "育成", "報酬制度"],
                },
                Category {
                    label: "働き方・組織",
                    subtopics: &["リモートワーク", "組織体制", "評価制度", "社内コミュニケーション"],
                },
                Category {
                    label: "業務効率化",
                    subtopics: &["業務の見える化", "自動化", "在庫管理", "品質管理"],
                },
                Category {
                    label: "DX推進",
                    subtopics: &["ツール選定", "データ活用", "ITリテラシー", "セキュリティ"],
                },
                Category {
                    label: "法務・リスク",
                    subtopics: &["契約", "コンプライアンス", "知的財産", "紛争対応"],
                },
                Category {
                    label: "その他",
                    subtopics: &[],
                },
            ],
            open_category: "その他",
            rounds: vec![
                RoundBrief {
                    title: "現状把握",
                    goal: "企業の現状とユーザーの主な関心事を把握する",
                },
                RoundBrief {
                    title: "課題の整理",
                    goal: "具体的な課題を洗い出し優先順位を付ける",
                },
                RoundBrief {
                    title: "原因分析",
                    goal: "優先度の高い課題の原因を特定する",
                },
                RoundBrief {
                    title: "施策の検討",
                    goal: "施策案を提示し比較する",
                },
                RoundBrief {
                    title: "実行計画",
                    goal: "次のアクション・担当・期限を合意する",
                },
            ],
            connective: Connective::Suffix("について"),
            confirmation: compile(&[
                r"(?i)^(?:はい|はいはい|うん|OK|お願い|お願いします|お願いいたします|よろしく|よろしくお願いします)[。！!]*$",
                r"^\s*[はいうんおっけー]\s*$",
                r"^(?:かまいません|問題ありません|大丈夫|大丈夫です)[。！!]*$",
            ])?,
            discussion_summary: compile(&[
                r"(?:.+?)(?:の話|に関する議論|についての議論|のやり取り)\s*(?:だけ)?\s*(?:を\s*)?(?:まとめて|整理して|要約して)\s*(?:レポート|資料|報告)",
                r"(?:まとめて|整理して|要約して)\s*(?:レポート|資料)\s*(?:に\s*)?(?:して|ください|ほしい)",
                r"(?:議論|やり取り)\s*(?:を\s*)?(?:まとめて|整理して)\s*(?:レポート|資料)",
                r"(?:.+?)\s*(?:の話|について)\s*(?:だけ)?\s*(?:まとめて|レポートに)",
            ])?,
            question_opener: Vec::new(),
            report_request: compile(&[
                r"レポート\s*(?:を?\s*)?(?:作成|作って|出力|出して|にして|ください|お願い)",
                r"(?:この内容|今の回答|回答)\s*(?:を?\s*)?(?:レポート|資料)(?:に\s*)?(?:して|ください|お願い)",
                r"資料\s*(?:を?\s*)?(?:作成|作って|出力|出して|ください|お願い)",
                r"(?:作成|作って|出力|出して)\s*(?:して\s*)?(?:ください|お願い)",
                r"(?:まとめて|まとめ)\s*(?:レポート|資料|報告)",
                r"(?:報告書|提案書)\s*(?:を?\s*)?(?:作成|作って|ください)",
                r"(?i)PDF\s*(?:で\s*)?(?:出して|ください|お願い)",
                r"(?i)(?:出して|ください|お願い)\s*(?:レポート|資料|報告書|PDF)",
            ])?,
            immediate_reference: compile(&[
                r"^(?:これ|この内容|この回答|今の回答|上の回答)を?\s*(?:レポート|資料)",
                r"^(?:これ|この内容|この回答)に?して\s*(?:ください|お願い)$",
            ])?,
            explicit_topic: compile(&[
                r"(.+?)について\s*[、,]?\s*これを?\s*(?:レポート|資料)(?:に|にして)",
            ])?,
            topic_reference: compile(&[
                r"(.+?)の内容を\s*(?:レポート|資料)",
                r"先ほどの\s*(.+?)(?:を|の内容|について)",
                r"(.+?)について(?:の)?\s*(?:レポート|資料)",
                r"(.+?)[をの]\s*(?:レポート|資料)(?:に|にして)",
            ])?,
            bare_demonstrative: Regex::new(r"^(?:これ|この|それ|その)$")?,
            trailing_demonstrative: Regex::new(r"[、,]?\s*(?:これ|この内容|この回答)\s*$")?,
            discussion_theme: compile(&[
                r"(.+?)(?:の話|に関する議論|についての議論|のやり取り)\s*(?:だけ)?\s*(?:を\s*)?(?:まとめて|整理|要約|レポート)",
                r"(.+?)\s*について\s*(?:だけ)?\s*(?:まとめて|レポート)",
            ])?,
            theme_fallback: Regex::new(r"(.+?)(?:まとめて|整理して|要約して)\s*(?:レポート|資料)")?,
            generic_theme_words: &[],
        })
    }

    /// Remove any connectives around a topic ("about about pricing" -> "pricing").
    pub fn strip_connective<'t>(&self, topic: &'t str) -> &'t str {
        let mut rest = topic.trim().trim_end_matches(['、', ',', ';']).trim();
        match self.connective {
            Connective::Prefix(words) => loop {
                let mut stripped = false;
                for word in words {
                    let Some(head) = rest.get(..word.len()) else {
                        continue;
                    };
                    let tail = &rest[word.len()..];
                    if head.eq_ignore_ascii_case(word) && tail.starts_with(char::is_whitespace) {
                        rest = tail.trim_start();
                        stripped = true;
                    }
                }
                if !stripped {
                    return rest;
                }
            },
            Connective::Suffix(word) => {
                while let Some(head) = rest.strip_suffix(word) {
                    rest = head.trim_end().trim_end_matches(['、', ',']).trim_end();
                }
                rest
            }
        }
    }

    /// The topic with exactly one connective.
    pub fn with_connective(&self, topic: &str) -> String {
        let core = self.strip_connective(topic);
        match self.connective {
            Connective::Prefix(words) => format!("{} {}", words[0], core),
            Connective::Suffix(word) => format!("{}{}", core, word),
        }
    }

    /// Collapse repeated connectives to one; topics without one are only trimmed.
    pub fn normalize_connective(&self, topic: &str) -> String {
        let trimmed = topic.trim();
        if self.strip_connective(trimmed) == trimmed {
            trimmed.to_string()
        } else {
            self.with_connective(trimmed)
        }
    }

    pub fn category(&self, label: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.label == label)
    }

    pub fn category_labels(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.label.to_string()).collect()
    }

    /// Title and goal for a 1-based round; rounds past the table get a generic title.
    pub fn round_brief(&self, round: u32) -> (String, String) {
        match round
            .checked_sub(1)
            .and_then(|i| self.rounds.get(i as usize))
        {
            Some(brief) => (brief.title.to_string(), brief.goal.to_string()),
            None => (format!("Step {}", round), String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_template_extracts_placeholder() {
        let t = "«{subject}» — report created.";
        assert_eq!(
            match_template(t, "{subject}", "«Pricing» — report created."),
            Some("Pricing")
        );
        assert_eq!(match_template(t, "{subject}", "«» — report created."), None);
        assert_eq!(match_template(t, "{subject}", "Pricing — report created."), None);
    }

    #[test]
    fn test_english_connective_is_single() {
        let rules = RuleSet::english().unwrap();
        assert_eq!(rules.with_connective("pricing"), "about pricing");
        assert_eq!(rules.with_connective("about about pricing, "), "about pricing");
        assert_eq!(rules.with_connective("Regarding pricing"), "about pricing");
        assert_eq!(rules.normalize_connective("about  regarding pricing"), "about pricing");
        assert_eq!(rules.normalize_connective("pricing strategy"), "pricing strategy");
        // "aboutness" is not a connective
        assert_eq!(rules.strip_connective("aboutness"), "aboutness");
    }

    #[test]
    fn test_japanese_connective_is_single() {
        let rules = RuleSet::japanese().unwrap();
        assert_eq!(
            rules.with_connective("長期的視点での投資判断について、"),
            "長期的視点での投資判断について"
        );
        assert_eq!(rules.with_connective("単価"), "単価について");
    }

    #[test]
    fn test_round_brief_past_table() {
        let rules = RuleSet::english().unwrap();
        assert_eq!(rules.round_brief(1).0, "Situation");
        assert_eq!(rules.round_brief(7).0, "Step 7");
        assert_eq!(rules.round_brief(0).0, "Step 0");
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!("ja".parse::<Locale>().unwrap(), Locale::Japanese);
        assert_eq!(" EN ".parse::<Locale>().unwrap(), Locale::English);
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn test_for_locale_tags_tables() {
        for locale in [Locale::English, Locale::Japanese] {
            assert_eq!(RuleSet::for_locale(locale).unwrap().locale, locale);
        }
    }
}

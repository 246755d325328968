use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::rules::{match_template, RuleSet};
use crate::transcript::types::{Role, Turn, TurnHint};

/// A turn as handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedTurn {
    pub order_index: u64,
    pub kind: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub round_index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<TurnHint>,
}

/// Rebuild the interactive hint of an advisor turn from its fixed wording.
fn reconstruct_hint(turn: &Turn, rules: &RuleSet) -> Option<TurnHint> {
    if turn.hint.is_some() {
        return turn.hint.clone();
    }
    if turn.role != Role::Advisor {
        return None;
    }
    let content = turn.content.trim();
    if content == rules.phrasing.greeting {
        return Some(TurnHint::CategoryChoices {
            categories: rules.category_labels(),
        });
    }
    if content == rules.phrasing.free_input_reply {
        return Some(TurnHint::FreeInput);
    }
    let label = match_template(rules.phrasing.category_follow_up, "{category}", content)?;
    let category = rules.category(label)?;
    Some(TurnHint::SubtopicChoices {
        category: category.label.to_string(),
        subtopics: category.subtopics.iter().map(|s| s.to_string()).collect(),
    })
}

pub fn map_turn(turn: &Turn, rules: &RuleSet) -> MappedTurn {
    MappedTurn {
        order_index: turn.order_index,
        kind: turn.role,
        content: turn.content.clone(),
        created_at: turn.created_at,
        round_index: turn.round_index,
        topic_tag: turn.topic_tag.clone(),
        hint: reconstruct_hint(turn, rules),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::fill;

    fn advisor(content: &str) -> Turn {
        Turn {
            order_index: 2,
            role: Role::Advisor,
            content: content.to_string(),
            created_at: Utc::now(),
            round_index: 1,
            topic_tag: None,
            hint: None,
        }
    }

    #[test]
    fn test_category_follow_up_gets_subtopics() {
        let rules = RuleSet::english().unwrap();
        let content = fill(rules.phrasing.category_follow_up, "{category}", "Cost reduction");
        let mapped = map_turn(&advisor(&content), &rules);
        assert_eq!(
            mapped.hint,
            Some(TurnHint::SubtopicChoices {
                category: "Cost reduction".to_string(),
                subtopics: vec![
                    "Procurement".to_string(),
                    "Fixed costs".to_string(),
                    "Energy".to_string(),
                    "Outsourcing".to_string()
                ],
            })
        );
        assert_eq!(
            serde_json::to_value(&mapped).unwrap()["kind"],
            serde_json::json!("advisor")
        );
    }

    #[test]
    fn test_unknown_category_and_plain_answers_have_no_hint() {
        let rules = RuleSet::english().unwrap();
        let content = fill(rules.phrasing.category_follow_up, "{category}", "Astrology");
        assert_eq!(map_turn(&advisor(&content), &rules).hint, None);
        assert_eq!(map_turn(&advisor("Pricing\n\nRaise prices."), &rules).hint, None);
    }

    #[test]
    fn test_free_input_and_greeting() {
        let rules = RuleSet::english().unwrap();
        assert_eq!(
            map_turn(&advisor(rules.phrasing.free_input_reply), &rules).hint,
            Some(TurnHint::FreeInput)
        );
        let greeting = map_turn(&advisor(rules.phrasing.greeting), &rules);
        assert!(matches!(
            greeting.hint,
            Some(TurnHint::CategoryChoices { ref categories }) if categories.len() == 8
        ));
    }
}

use chrono::Duration;

use super::types::{Role, Session, Turn, TurnHint};
use crate::rules::RuleSet;

/// The virtual opening turn shown when a transcript is paged from its start.
///
/// Recomputed on every request and never stored. Its timestamp sits one
/// second before the oldest stored turn, or at session creation when the
/// transcript is still empty, so repeated calls yield the same turn.
pub fn bootstrap_turn(session: &Session, oldest: Option<&Turn>, rules: &RuleSet) -> Turn {
    let anchor = oldest.map(|t| t.created_at).unwrap_or(session.created_at);
    Turn {
        order_index: 0,
        role: Role::Advisor,
        content: rules.phrasing.greeting.to_string(),
        created_at: anchor - Duration::seconds(1),
        round_index: 0,
        topic_tag: None,
        hint: Some(TurnHint::CategoryChoices {
            categories: rules.category_labels(),
        }),
    }
}

pub mod bootstrap;
pub mod sessions;
pub mod types;

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::AdvisorError;
use crate::rules::RuleSet;
use bootstrap::bootstrap_turn;
use types::{Session, SessionId, Turn, TurnDraft, TurnPage};

/// Hard cap on turns returned per page.
pub const MAX_PAGE_LIMIT: usize = 100;

/// Append-only transcripts, one per session.
///
/// Each transcript is kept newest-first so recent turns are cheap to reach;
/// everything handed to callers is oldest-first.
#[derive(Default)]
pub struct TurnStore {
    transcripts: RwLock<HashMap<SessionId, VecDeque<Turn>>>,
}

impl TurnStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and assign it the next order index.
    /// Round tagging comes from the caller.
    pub async fn append(&self, session: &Session, draft: TurnDraft) -> Result<Turn, AdvisorError> {
        if !session.is_active() {
            return Err(AdvisorError::StateConflict(format!(
                "session {} is {:?}; no new turns may be added",
                session.id, session.status
            )));
        }

        let mut transcripts = self.transcripts.write().await;
        let transcript = transcripts.entry(session.id.clone()).or_default();
        let order_index = transcript.front().map(|t| t.order_index).unwrap_or(0) + 1;
        let turn = Turn {
            order_index,
            role: draft.role,
            content: draft.content,
            created_at: Utc::now(),
            round_index: draft.round_index,
            topic_tag: draft.topic_tag,
            hint: None,
        };
        transcript.push_front(turn.clone());
        debug!(
            session = %session.id,
            order_index,
            role = ?turn.role,
            round = turn.round_index,
            "turn appended"
        );
        Ok(turn)
    }

    /// A page over the virtual transcript `[bootstrap, stored turns...]`.
    /// `limit` is clamped to [`MAX_PAGE_LIMIT`].
    pub async fn page(
        &self,
        session: &Session,
        offset: usize,
        limit: usize,
        rules: &RuleSet,
    ) -> TurnPage {
        let limit = limit.min(MAX_PAGE_LIMIT);
        let transcripts = self.transcripts.read().await;
        let stored = transcripts.get(&session.id);
        let stored_count = stored.map(|t| t.len()).unwrap_or(0);

        let mut turns = Vec::with_capacity(limit);
        let mut skip = offset;
        if limit > 0 && offset == 0 {
            turns.push(bootstrap_turn(
                session,
                stored.and_then(|t| t.back()),
                rules,
            ));
        } else {
            skip = offset.saturating_sub(1);
        }

        if let Some(stored) = stored {
            turns.extend(
                stored
                    .iter()
                    .rev()
                    .skip(skip)
                    .take(limit - turns.len())
                    .cloned(),
            );
        }

        TurnPage {
            turns,
            total: stored_count + 1,
        }
    }

    /// Full transcript, oldest first.
    pub async fn all(&self, session_id: &str) -> Vec<Turn> {
        let transcripts = self.transcripts.read().await;
        transcripts
            .get(session_id)
            .map(|t| t.iter().rev().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn first(&self, session_id: &str) -> Option<Turn> {
        let transcripts = self.transcripts.read().await;
        transcripts.get(session_id).and_then(|t| t.back().cloned())
    }

    pub async fn count(&self, session_id: &str) -> usize {
        let transcripts = self.transcripts.read().await;
        transcripts.get(session_id).map(|t| t.len()).unwrap_or(0)
    }

    /// Turns tagged with a given round, oldest first.
    pub async fn in_round(&self, session_id: &str, round: u32) -> Vec<Turn> {
        let transcripts = self.transcripts.read().await;
        transcripts
            .get(session_id)
            .map(|t| {
                t.iter()
                    .rev()
                    .filter(|turn| turn.round_index == round)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcript::types::{Role, SessionStatus};

    fn session(id: &str) -> Session {
        let now = Utc::now();
        Session {
            id: id.to_string(),
            channel_id: 1,
            round_cap: 5,
            current_round: 0,
            max_reached_round: 0,
            status: SessionStatus::Active,
            continuation_id: None,
            created_at: now,
            last_activity_at: now,
        }
    }

    async fn seeded(store: &TurnStore, s: &Session, n: usize) {
        for i in 0..n {
            let draft = if i % 2 == 0 {
                TurnDraft::user(format!("question {}", i), 1)
            } else {
                TurnDraft::advisor(format!("answer {}", i), 1)
            };
            store.append(s, draft).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_append_numbers_from_one() {
        let store = TurnStore::new();
        let s = session("a");
        let first = store.append(&s, TurnDraft::user("hi", 1)).await.unwrap();
        let second = store.append(&s, TurnDraft::advisor("hello", 1)).await.unwrap();
        assert_eq!(first.order_index, 1);
        assert_eq!(second.order_index, 2);
        assert_eq!(store.first("a").await.unwrap().content, "hi");
    }

    #[tokio::test]
    async fn test_append_rejected_on_closed_session() {
        let store = TurnStore::new();
        let mut s = session("a");
        s.status = SessionStatus::Completed;
        let err = store.append(&s, TurnDraft::user("hi", 1)).await.unwrap_err();
        assert!(matches!(err, AdvisorError::StateConflict(_)));
        assert_eq!(store.count("a").await, 0);
    }

    #[tokio::test]
    async fn test_page_from_start_includes_bootstrap() {
        let rules = RuleSet::english().unwrap();
        let store = TurnStore::new();
        let s = session("a");
        seeded(&store, &s, 3).await;

        let page = store.page(&s, 0, 10, &rules).await;
        assert_eq!(page.total, 4);
        assert_eq!(page.turns.len(), 4);
        assert_eq!(page.turns[0].order_index, 0);
        assert_eq!(page.turns[0].role, Role::Advisor);
        assert!(page.turns[0].created_at < page.turns[1].created_at);
        let indices: Vec<u64> = page.turns.iter().map(|t| t.order_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_page_offset_skips_bootstrap() {
        let rules = RuleSet::english().unwrap();
        let store = TurnStore::new();
        let s = session("a");
        seeded(&store, &s, 5).await;

        let page = store.page(&s, 2, 2, &rules).await;
        let indices: Vec<u64> = page.turns.iter().map(|t| t.order_index).collect();
        assert_eq!(indices, vec![2, 3]);
        assert_eq!(page.total, 6);
    }

    #[tokio::test]
    async fn test_page_limit_is_clamped() {
        let rules = RuleSet::english().unwrap();
        let store = TurnStore::new();
        let s = session("a");
        seeded(&store, &s, 120).await;

        let page = store.page(&s, 0, 500, &rules).await;
        assert_eq!(page.turns.len(), MAX_PAGE_LIMIT);
        assert_eq!(page.total, 121);
    }

    #[tokio::test]
    async fn test_bootstrap_is_stable_across_pages() {
        let rules = RuleSet::english().unwrap();
        let store = TurnStore::new();
        let s = session("a");

        let empty_a = store.page(&s, 0, 10, &rules).await;
        let empty_b = store.page(&s, 0, 10, &rules).await;
        assert_eq!(empty_a, empty_b);
        assert_eq!(empty_a.total, 1);

        seeded(&store, &s, 2).await;
        let a = store.page(&s, 0, 10, &rules).await;
        let b = store.page(&s, 0, 10, &rules).await;
        assert_eq!(a.turns[0], b.turns[0]);
        assert_eq!(a.total, b.total);
    }

    #[tokio::test]
    async fn test_in_round_filters_by_tag() {
        let store = TurnStore::new();
        let s = session("a");
        store.append(&s, TurnDraft::user("r1", 1)).await.unwrap();
        store.append(&s, TurnDraft::user("r2", 2)).await.unwrap();
        store.append(&s, TurnDraft::advisor("r2 answer", 2)).await.unwrap();
        let round_two = store.in_round("a", 2).await;
        assert_eq!(round_two.len(), 2);
        assert_eq!(round_two[0].content, "r2");
    }
}

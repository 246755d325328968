use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::transcript::types::SessionId;

/// The advisor answer a report request was bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTurn {
    pub order_index: u64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum PendingKind {
    /// Turn one earlier answer into a report.
    DirectEcho {
        topic: Option<String>,
        target: Option<TargetTurn>,
        /// The request pointed at "this answer" rather than naming a topic.
        immediate: bool,
    },
    /// Summarize everything said about a theme.
    DiscussionSummary { theme: Option<String> },
    /// The user named a topic no earlier answer is titled after.
    UserTopicFallback { topic: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub session_id: SessionId,
    pub kind: PendingKind,
    pub raw_message: String,
    pub opened_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn new(session_id: &str, kind: PendingKind, raw_message: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            kind,
            raw_message: raw_message.trim().to_string(),
            opened_at: Utc::now(),
        }
    }
}

/// At most one outstanding clarification per session.
#[derive(Default)]
pub struct PendingLedger {
    entries: Mutex<HashMap<SessionId, PendingRequest>>,
}

impl PendingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a request, replacing any unresolved one. Returns the replaced entry.
    pub async fn open(&self, request: PendingRequest) -> Option<PendingRequest> {
        let mut entries = self.entries.lock().await;
        let session_id = request.session_id.clone();
        let replaced = entries.insert(session_id.clone(), request);
        if replaced.is_some() {
            info!(session = %session_id, "pending report request replaced");
        }
        replaced
    }

    /// Take the session's pending request, leaving none behind.
    pub async fn resolve(&self, session_id: &str) -> Option<PendingRequest> {
        self.entries.lock().await.remove(session_id)
    }

    pub async fn peek(&self, session_id: &str) -> Option<PendingRequest> {
        self.entries.lock().await.get(session_id).cloned()
    }

    /// Drop a session's entry without resolving it (session ended).
    pub async fn discard(&self, session_id: &str) {
        self.entries.lock().await.remove(session_id);
    }
}

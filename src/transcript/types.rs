use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session ID (blake3 hex prefix of channel + creation instant).
pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Advisor,
}

/// Structured interactive payload the presentation layer can render as
/// buttons or an input box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnHint {
    CategoryChoices { categories: Vec<String> },
    SubtopicChoices { category: String, subtopics: Vec<String> },
    FreeInput,
}

/// One message in a transcript. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Monotonic per session. 0 is reserved for the synthetic bootstrap turn.
    pub order_index: u64,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub round_index: u32,
    #[serde(default)]
    pub topic_tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<TurnHint>,
}

impl Turn {
    pub fn is_bootstrap(&self) -> bool {
        self.order_index == 0
    }
}

/// Caller-supplied part of a turn; the store assigns index and timestamp.
#[derive(Debug, Clone)]
pub struct TurnDraft {
    pub role: Role,
    pub content: String,
    pub round_index: u32,
    pub topic_tag: Option<String>,
}

impl TurnDraft {
    pub fn user(content: impl Into<String>, round_index: u32) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            round_index,
            topic_tag: None,
        }
    }

    pub fn advisor(content: impl Into<String>, round_index: u32) -> Self {
        Self {
            role: Role::Advisor,
            content: content.into(),
            round_index,
            topic_tag: None,
        }
    }

    pub fn tagged(mut self, topic_tag: Option<String>) -> Self {
        self.topic_tag = topic_tag;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Discord channel the conversation lives in.
    pub channel_id: u64,
    pub round_cap: u32,
    /// Number of closed rounds, `0..=round_cap`.
    pub current_round: u32,
    /// Highest `current_round` ever reached; stepping back never lowers it.
    pub max_reached_round: u32,
    pub status: SessionStatus,
    /// Conversation handle issued by the reasoning service.
    #[serde(default)]
    pub continuation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// A page of stored turns, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnPage {
    pub turns: Vec<Turn>,
    /// Stored turns plus the synthetic bootstrap turn.
    pub total: usize,
}

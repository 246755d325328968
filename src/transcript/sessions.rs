use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::{Session, SessionId, SessionStatus};
use crate::error::AdvisorError;

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, Session>,
    /// Channel -> most recently opened session in it.
    by_channel: HashMap<u64, SessionId>,
}

/// In-memory session registry.
#[derive(Default)]
pub struct SessionStore {
    registry: RwLock<Registry>,
}

fn session_id(channel_id: u64, nonce: i64) -> SessionId {
    let hash = blake3::hash(format!("{}:{}", channel_id, nonce).as_bytes());
    hash.to_hex().as_str()[..16].to_string()
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel's active session, or a fresh one with `round_cap` rounds.
    pub async fn open(&self, channel_id: u64, round_cap: u32) -> Session {
        let mut registry = self.registry.write().await;
        if let Some(existing) = registry
            .by_channel
            .get(&channel_id)
            .and_then(|id| registry.sessions.get(id))
            .filter(|s| s.is_active())
        {
            return existing.clone();
        }

        let now = Utc::now();
        let mut nonce = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp());
        let mut id = session_id(channel_id, nonce);
        while registry.sessions.contains_key(&id) {
            nonce += 1;
            id = session_id(channel_id, nonce);
        }

        let session = Session {
            id: id.clone(),
            channel_id,
            round_cap,
            current_round: 0,
            max_reached_round: 0,
            status: SessionStatus::Active,
            continuation_id: None,
            created_at: now,
            last_activity_at: now,
        };
        registry.sessions.insert(id.clone(), session.clone());
        registry.by_channel.insert(channel_id, id.clone());
        info!(session = %id, channel_id, round_cap, "session opened");
        session
    }

    pub async fn get(&self, session_id: &str) -> Result<Session, AdvisorError> {
        let registry = self.registry.read().await;
        registry
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| AdvisorError::session_not_found(session_id))
    }

    /// The latest session opened in a channel, whatever its status.
    pub async fn for_channel(&self, channel_id: u64) -> Result<Session, AdvisorError> {
        let registry = self.registry.read().await;
        registry
            .by_channel
            .get(&channel_id)
            .and_then(|id| registry.sessions.get(id))
            .cloned()
            .ok_or_else(|| AdvisorError::NotFound(format!("no session in channel {}", channel_id)))
    }

    /// Apply `change` to a copy of the session and commit it only on success,
    /// so a rejected change leaves no trace.
    pub async fn modify<T>(
        &self,
        session_id: &str,
        change: impl FnOnce(&mut Session) -> Result<T, AdvisorError>,
    ) -> Result<(Session, T), AdvisorError> {
        let mut registry = self.registry.write().await;
        let current = registry
            .sessions
            .get(session_id)
            .ok_or_else(|| AdvisorError::session_not_found(session_id))?;
        let mut draft = current.clone();
        let out = change(&mut draft)?;
        registry
            .sessions
            .insert(session_id.to_string(), draft.clone());
        Ok((draft, out))
    }

    /// Record activity on a session.
    pub async fn touch(&self, session_id: &str) -> Result<(), AdvisorError> {
        self.modify(session_id, |s| {
            s.last_activity_at = Utc::now();
            Ok(())
        })
        .await
        .map(|_| ())
    }

    /// Move an active session to `Completed` or `Cancelled`.
    pub async fn finish(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<Session, AdvisorError> {
        if status == SessionStatus::Active {
            return Err(AdvisorError::Validation(
                "a session can only be finished as completed or cancelled".to_string(),
            ));
        }
        let (session, _) = self
            .modify(session_id, |s| {
                if !s.is_active() {
                    return Err(AdvisorError::StateConflict(format!(
                        "session {} is already {:?}",
                        s.id, s.status
                    )));
                }
                s.status = status;
                s.last_activity_at = Utc::now();
                Ok(())
            })
            .await?;
        debug!(session = %session.id, status = ?session.status, "session finished");
        Ok(session)
    }
}

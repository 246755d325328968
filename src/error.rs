use thiserror::Error;

/// Failures a caller of the advisor can observe.
///
/// Reasoning-service failures never show up here: they are replaced by a
/// fallback advisor turn. Bookkeeping failures are logged and swallowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdvisorError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("state conflict: {0}")]
    StateConflict(String),
    #[error("not found: {0}")]
    NotFound(String),
}

impl AdvisorError {
    pub fn session_not_found(session_id: &str) -> Self {
        Self::NotFound(format!("session {}", session_id))
    }
}

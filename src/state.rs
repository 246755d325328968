use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tokio::sync::RwLock;

use crate::advisor::Advisor;

/// Advisor parameters admins can modify at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvisorConfig {
    /// Rounds a new session may close.
    pub round_cap: u32,
    pub reply_timeout_secs: u64,
    /// Turns per `/advisor history` page when no limit is given.
    pub page_limit: usize,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            round_cap: 5,
            reply_timeout_secs: 60,
            page_limit: 20,
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match dotenv::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a number, got {:?}", key, raw)),
        _ => Ok(default),
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            round_cap: env_or("ADVISOR_ROUND_CAP", defaults.round_cap)?,
            reply_timeout_secs: env_or("ADVISOR_REPLY_TIMEOUT_SECS", defaults.reply_timeout_secs)?,
            page_limit: defaults.page_limit,
        };
        if config.round_cap == 0 {
            anyhow::bail!("ADVISOR_ROUND_CAP must be at least 1");
        }
        Ok(config)
    }
}

pub struct AppState {
    pub advisor: Arc<Advisor>,
    pub admin_ids: HashSet<u64>,
    pub config: Arc<RwLock<AdvisorConfig>>,
}

impl AppState {
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

pub type Context<'a> = poise::Context<'a, AppState, anyhow::Error>;

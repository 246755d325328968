use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use super::compose::is_exportable;
use crate::rules::RuleSet;
use crate::transcript::types::{Role, SessionId, Turn};

static REPORT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Most recent turns a theme collection keeps.
pub const COLLECT_MAX_TURNS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportSource {
    /// A single earlier answer.
    Answer { order_index: u64 },
    /// Everything said about a theme.
    Discussion { theme: Option<String> },
    /// A topic no answer was titled after.
    UserTopic { topic: String },
    /// All turns of a closed round.
    Step { round: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// blake3 hex prefix of session, title, body and a process-wide sequence.
    pub id: String,
    pub session_id: SessionId,
    pub title: String,
    pub body: String,
    pub source: ReportSource,
    pub round_index: u32,
    pub created_at: DateTime<Utc>,
}

impl Report {
    pub fn new(
        session_id: &str,
        title: String,
        body: String,
        source: ReportSource,
        round_index: u32,
    ) -> Self {
        let created_at = Utc::now();
        let seq = REPORT_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut hasher = blake3::Hasher::new();
        hasher.update(session_id.as_bytes());
        hasher.update(title.as_bytes());
        hasher.update(body.as_bytes());
        hasher.update(&seq.to_le_bytes());
        hasher.update(created_at.to_rfc3339().as_bytes());
        let id = hasher.finalize().to_hex().as_str()[..16].to_string();
        Self {
            id,
            session_id: session_id.to_string(),
            title,
            body,
            source,
            round_index,
            created_at,
        }
    }
}

/// Exportable turns whose content mentions `theme` (case-insensitive);
/// every exportable turn when `theme` is `None`. Keeps the most recent
/// [`COLLECT_MAX_TURNS`], oldest first.
pub fn collect_by_theme<'t>(turns: &'t [Turn], theme: Option<&str>, rules: &RuleSet) -> Vec<&'t Turn> {
    let needle = theme.map(|t| rules.strip_connective(t).to_lowercase());
    let matching: Vec<&Turn> = turns
        .iter()
        .filter(|t| is_exportable(t, rules))
        .filter(|t| match &needle {
            Some(n) if !n.is_empty() => t.content.to_lowercase().contains(n.as_str()),
            _ => true,
        })
        .collect();
    let skip = matching.len().saturating_sub(COLLECT_MAX_TURNS);
    matching.into_iter().skip(skip).collect()
}

/// Render turns as a labelled transcript.
pub fn format_transcript(turns: &[&Turn], rules: &RuleSet) -> String {
    turns
        .iter()
        .map(|t| {
            let label = match t.role {
                Role::User => rules.phrasing.user_label,
                Role::Advisor => rules.phrasing.advisor_label,
            };
            format!("[{}]\n{}", label, t.content.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Reports produced per session.
#[derive(Default)]
pub struct ReportShelf {
    reports: RwLock<HashMap<SessionId, Vec<Report>>>,
}

impl ReportShelf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a report. A step report replaces an earlier one for the same round.
    pub async fn put(&self, report: Report) {
        let mut reports = self.reports.write().await;
        let shelf = reports.entry(report.session_id.clone()).or_default();
        if let ReportSource::Step { round } = report.source {
            shelf.retain(|r| r.source != ReportSource::Step { round });
        }
        debug!(
            session = %report.session_id,
            report_id = %report.id,
            title = %report.title,
            body_len = report.body.len(),
            "report stored"
        );
        shelf.push(report);
    }

    /// Reports of a session, oldest first.
    pub async fn list(&self, session_id: &str) -> Vec<Report> {
        let reports = self.reports.read().await;
        reports.get(session_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::compose;

    fn turn(i: u64, role: Role, content: &str) -> Turn {
        Turn {
            order_index: i,
            role,
            content: content.to_string(),
            created_at: Utc::now(),
            round_index: 1,
            topic_tag: None,
            hint: None,
        }
    }

    #[test]
    fn test_collect_by_theme_excludes_synthetic_turns() {
        let rules = RuleSet::english().unwrap();
        let turns = vec![
            turn(1, Role::User, "How do we fix unit prices?"),
            turn(2, Role::Advisor, "Unit prices\n\nRaise them slowly."),
            turn(3, Role::User, "And hiring?"),
            turn(4, Role::Advisor, &compose::echo("the discussion about unit prices", &rules)),
            turn(5, Role::Advisor, &compose::receipt("the discussion about unit prices", &rules)),
        ];
        let collected = collect_by_theme(&turns, Some("unit prices"), &rules);
        let indices: Vec<u64> = collected.iter().map(|t| t.order_index).collect();
        assert_eq!(indices, vec![1, 2]);

        let text = format_transcript(&collected, &rules);
        assert_eq!(
            text,
            "[User]\nHow do we fix unit prices?\n\n[Advisor]\nUnit prices\n\nRaise them slowly."
        );
    }

    #[test]
    fn test_collect_keeps_most_recent() {
        let rules = RuleSet::english().unwrap();
        let turns: Vec<Turn> = (1..=60)
            .map(|i| turn(i, Role::User, "pricing again"))
            .collect();
        let collected = collect_by_theme(&turns, Some("pricing"), &rules);
        assert_eq!(collected.len(), COLLECT_MAX_TURNS);
        assert_eq!(collected[0].order_index, 11);
        assert_eq!(collected.last().unwrap().order_index, 60);
    }

    #[test]
    fn test_identical_reports_get_distinct_ids() {
        let make = || {
            Report::new(
                "s",
                "Pricing".to_string(),
                "same body".to_string(),
                ReportSource::Answer { order_index: 2 },
                1,
            )
        };
        let (first, second) = (make(), make());
        assert_ne!(first.id, second.id);
        assert_eq!(first.id.len(), 16);
    }

    #[tokio::test]
    async fn test_step_report_replaced_per_round() {
        let shelf = ReportShelf::new();
        let step = |body: &str| {
            Report::new("s", "STEP 1".to_string(), body.to_string(), ReportSource::Step { round: 1 }, 1)
        };
        shelf.put(step("first")).await;
        shelf
            .put(Report::new(
                "s",
                "Pricing".to_string(),
                "body".to_string(),
                ReportSource::Answer { order_index: 2 },
                1,
            ))
            .await;
        shelf.put(step("second")).await;

        let reports = shelf.list("s").await;
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].title, "Pricing");
        assert_eq!(reports[1].body, "second");
        assert!(shelf.list("other").await.is_empty());
    }
}

//! The advisory conversation: one submitted message in, the stored turn
//! pair out. Routes each message through intent classification, the
//! pending-report ledger or the reasoning service, and keeps rounds,
//! transcripts and reports consistent.

pub mod mapping;


use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info, warn};

use crate::error::AdvisorError;
use crate::llm::{ReasoningReply, ReasoningRequest, ReasoningService};
use crate::report::compose::{self, is_exportable};
use crate::report::shelf::{collect_by_theme, format_transcript};
use crate::report::{
    Intent, IntentClassifier, PendingKind, PendingLedger, PendingRequest, Reference,
    ReferenceResolver, Report, ReportShelf, ReportSource, TargetTurn,
};
use crate::rounds;
use crate::rules::{fill, RuleSet};
use crate::state::AdvisorConfig;
use crate::transcript::sessions::SessionStore;
use crate::transcript::types::{Role, Session, SessionId, SessionStatus, Turn, TurnDraft};
use crate::transcript::TurnStore;
pub use mapping::{map_turn, MappedTurn};

const PREVIEW_CHARS: usize = 200;

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

#[derive(Debug, Clone, Default)]
pub struct TopicMetadata {
    pub selected_topic: Option<String>,
}

/// One message handed in by the presentation layer.
#[derive(Debug, Clone, Default)]
pub struct SubmitTurn {
    pub session_id: SessionId,
    pub message: String,
    /// Store `precomputed_reply` as the answer instead of asking the
    /// reasoning service (category selection).
    pub bypass_reasoning: bool,
    pub precomputed_reply: Option<String>,
    pub topic: Option<TopicMetadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub intent: Intent,
    pub turns: Vec<MappedTurn>,
    pub current_round: u32,
    pub round_cap: u32,
    pub limit_reached: bool,
    pub continuation_id: Option<String>,
    /// Set when the message confirmed a pending report.
    pub report: Option<Report>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptPage {
    pub turns: Vec<MappedTurn>,
    pub total: usize,
    pub has_more: bool,
}

#[derive(Debug, Clone)]
pub struct StepClosed {
    pub session: Session,
    pub closed_round: u32,
    pub report: Report,
}

pub struct Advisor {
    sessions: SessionStore,
    turns: TurnStore,
    ledger: PendingLedger,
    shelf: ReportShelf,
    classifier: IntentClassifier,
    resolver: ReferenceResolver,
    rules: Arc<RuleSet>,
    reasoning: Arc<dyn ReasoningService>,
    config: Arc<RwLock<AdvisorConfig>>,
    /// Serializes submissions, round changes and finishing per session.
    turn_locks: Mutex<HashMap<SessionId, Arc<Mutex<()>>>>,
}

impl Advisor {
    pub fn new(
        rules: Arc<RuleSet>,
        reasoning: Arc<dyn ReasoningService>,
        config: Arc<RwLock<AdvisorConfig>>,
    ) -> Self {
        Self {
            sessions: SessionStore::new(),
            turns: TurnStore::new(),
            ledger: PendingLedger::new(),
            shelf: ReportShelf::new(),
            classifier: IntentClassifier::new(rules.clone()),
            resolver: ReferenceResolver::new(rules.clone()),
            rules,
            reasoning,
            config,
            turn_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Exclusive access to one session's transcript and rounds. Held across
    /// the reasoning-service wait, so a session cannot be finished or have
    /// its round closed while an answer is in flight.
    async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.turn_locks.lock().await;
            locks.entry(session_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The channel's active session, or a new one with the configured round cap.
    pub async fn open_session(&self, channel_id: u64) -> Session {
        let round_cap = self.config.read().await.round_cap;
        self.sessions.open(channel_id, round_cap).await
    }

    pub async fn session_for_channel(&self, channel_id: u64) -> Result<Session, AdvisorError> {
        self.sessions.for_channel(channel_id).await
    }

    pub async fn session(&self, session_id: &str) -> Result<Session, AdvisorError> {
        self.sessions.get(session_id).await
    }

    pub async fn submit(&self, request: SubmitTurn) -> Result<SubmitOutcome, AdvisorError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(AdvisorError::Validation("message is required".to_string()));
        }
        self.sessions.get(&request.session_id).await?;
        let _guard = self.lock_session(&request.session_id).await;
        // re-read under the lock: a finish may have won the race
        let session = self.sessions.get(&request.session_id).await?;
        rounds::ensure_active(&session)?;
        let topic_tag = request
            .topic
            .and_then(|t| t.selected_topic)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if request.bypass_reasoning {
            let reply = request
                .precomputed_reply
                .filter(|r| !r.trim().is_empty())
                .ok_or_else(|| {
                    AdvisorError::Validation(
                        "a precomputed reply is required when bypassing the reasoning service"
                            .to_string(),
                    )
                })?;
            return self
                .store_exchange(&session, message, reply, topic_tag, Intent::PlainQuery, None)
                .await;
        }

        let intent = self.classifier.classify(message);
        info!(session = %session.id, intent = ?intent, "message classified");

        match intent {
            Intent::Confirmation => match self.ledger.resolve(&session.id).await {
                Some(pending) => self.confirm(&session, message, pending, topic_tag).await,
                None => {
                    debug!(session = %session.id, "nothing pending; answering as a plain query");
                    self.answer(&session, message, topic_tag, intent).await
                }
            },
            Intent::ReportRequest | Intent::DiscussionSummaryRequest => {
                self.clarify(&session, message, intent, topic_tag).await
            }
            Intent::PlainQuery => self.answer(&session, message, topic_tag, intent).await,
        }
    }

    /// Page over `[bootstrap, stored turns...]`. `limit` defaults to the
    /// configured page size and is clamped to 100.
    pub async fn page(
        &self,
        session_id: &str,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<TranscriptPage, AdvisorError> {
        let session = self.sessions.get(session_id).await?;
        let limit = match limit {
            Some(limit) => limit,
            None => self.config.read().await.page_limit,
        };
        let page = self.turns.page(&session, offset, limit, &self.rules).await;
        let has_more = offset + page.turns.len() < page.total;
        Ok(TranscriptPage {
            turns: page
                .turns
                .iter()
                .map(|t| map_turn(t, &self.rules))
                .collect(),
            total: page.total,
            has_more,
        })
    }

    /// Close the active round and file its step report.
    pub async fn close_step(&self, session_id: &str) -> Result<StepClosed, AdvisorError> {
        self.sessions.get(session_id).await?;
        let _guard = self.lock_session(session_id).await;
        let (session, closed_round) = self
            .sessions
            .modify(session_id, rounds::close_active_round)
            .await?;

        let turns = self.turns.in_round(session_id, closed_round).await;
        let exportable: Vec<&Turn> = turns
            .iter()
            .filter(|t| is_exportable(t, &self.rules))
            .collect();
        let (round_title, _) = self.rules.round_brief(closed_round);
        let title = fill(
            &fill(
                self.rules.phrasing.step_report_title,
                "{round}",
                &closed_round.to_string(),
            ),
            "{title}",
            &round_title,
        );
        let body = if exportable.is_empty() {
            self.rules.phrasing.no_conversation.to_string()
        } else {
            format_transcript(&exportable, &self.rules)
        };

        let report = Report::new(
            session_id,
            title,
            body,
            ReportSource::Step {
                round: closed_round,
            },
            closed_round,
        );
        self.shelf.put(report.clone()).await;
        info!(
            session = %session_id,
            closed_round,
            current_round = session.current_round,
            round_cap = session.round_cap,
            turns = exportable.len(),
            "step closed"
        );
        Ok(StepClosed {
            session,
            closed_round,
            report,
        })
    }

    pub async fn rewind(&self, session_id: &str, round: u32) -> Result<Session, AdvisorError> {
        self.sessions.get(session_id).await?;
        let _guard = self.lock_session(session_id).await;
        let (session, _) = self
            .sessions
            .modify(session_id, |s| rounds::rewind(s, round))
            .await?;
        info!(session = %session_id, round, max_reached = session.max_reached_round, "round rewound");
        Ok(session)
    }

    /// Complete or cancel a session once any in-flight submission is done.
    /// Any pending report request and the reasoning-service history are dropped.
    pub async fn finish(
        &self,
        session_id: &str,
        status: SessionStatus,
    ) -> Result<Session, AdvisorError> {
        self.sessions.get(session_id).await?;
        let _guard = self.lock_session(session_id).await;
        let session = self.sessions.finish(session_id, status).await?;
        self.ledger.discard(session_id).await;
        if let Some(continuation_id) = &session.continuation_id {
            self.reasoning.forget(continuation_id).await;
        }
        self.turn_locks.lock().await.remove(session_id);
        info!(
            session = %session_id,
            status = ?session.status,
            "session closed; pending request and history dropped"
        );
        Ok(session)
    }

    pub async fn reports(&self, session_id: &str) -> Result<Vec<Report>, AdvisorError> {
        self.sessions.get(session_id).await?;
        Ok(self.shelf.list(session_id).await)
    }

    pub async fn pending(&self, session_id: &str) -> Option<PendingRequest> {
        self.ledger.peek(session_id).await
    }

    /// The fixed advisor reply to a category pick, or `None` for an unknown label.
    pub fn category_reply(&self, label: &str) -> Option<String> {
        if label == self.rules.open_category {
            return Some(self.rules.phrasing.free_input_reply.to_string());
        }
        self.rules
            .category(label)
            .map(|c| fill(self.rules.phrasing.category_follow_up, "{category}", c.label))
    }

    async fn answer(
        &self,
        session: &Session,
        message: &str,
        topic_tag: Option<String>,
        intent: Intent,
    ) -> Result<SubmitOutcome, AdvisorError> {
        let round = rounds::active_round(session);
        let user_turn = match self.duplicate_initial(session, message).await {
            Some(turn) => {
                info!(session = %session.id, "initial message already stored; reusing it");
                turn
            }
            None => {
                self.turns
                    .append(session, TurnDraft::user(message, round).tagged(topic_tag.clone()))
                    .await?
            }
        };

        let reply = self.consult(session, message, round).await;
        let advisor_turn = self
            .turns
            .append(session, TurnDraft::advisor(reply.content, round).tagged(topic_tag))
            .await?;

        let continuation_id = reply
            .continuation_id
            .or_else(|| session.continuation_id.clone());
        if continuation_id != session.continuation_id {
            let id = continuation_id.clone();
            if let Err(e) = self
                .sessions
                .modify(&session.id, |s| {
                    s.continuation_id = id;
                    Ok(())
                })
                .await
            {
                warn!(session = %session.id, error = %e, "failed to record continuation id");
            }
        }
        self.touch(&session.id).await;

        Ok(self.outcome(
            intent,
            session,
            &[user_turn, advisor_turn],
            continuation_id,
            None,
        ))
    }

    /// Store a user message with a reply that did not come from the
    /// reasoning service.
    async fn store_exchange(
        &self,
        session: &Session,
        message: &str,
        reply: String,
        topic_tag: Option<String>,
        intent: Intent,
        report: Option<Report>,
    ) -> Result<SubmitOutcome, AdvisorError> {
        let round = rounds::active_round(session);
        let user_turn = self
            .turns
            .append(session, TurnDraft::user(message, round).tagged(topic_tag.clone()))
            .await?;
        let advisor_turn = self
            .turns
            .append(session, TurnDraft::advisor(reply, round).tagged(topic_tag))
            .await?;
        self.touch(&session.id).await;
        Ok(self.outcome(
            intent,
            session,
            &[user_turn, advisor_turn],
            session.continuation_id.clone(),
            report,
        ))
    }

    /// A resubmitted opening message: the transcript holds exactly one
    /// turn and it is this very user message.
    async fn duplicate_initial(&self, session: &Session, message: &str) -> Option<Turn> {
        if self.turns.count(&session.id).await != 1 {
            return None;
        }
        self.turns
            .first(&session.id)
            .await
            .filter(|t| t.role == Role::User && t.content == message)
    }

    /// Ask the reasoning service, substituting fixed wording on failure,
    /// timeout or an empty answer.
    async fn consult(&self, session: &Session, message: &str, round: u32) -> ReasoningReply {
        let (round_title, round_goal) = self.rules.round_brief(round);
        let request = ReasoningRequest {
            session_id: session.id.clone(),
            message: message.to_string(),
            active_round: round,
            round_title,
            round_goal,
            continuation_id: session.continuation_id.clone(),
        };
        let timeout_secs = self.config.read().await.reply_timeout_secs;
        let started = Instant::now();

        let fallback = |content: &str| ReasoningReply {
            content: content.to_string(),
            tokens_used: None,
            continuation_id: None,
        };

        match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.reasoning.reply(&request),
        )
        .await
        {
            Ok(Ok(reply)) if !reply.content.trim().is_empty() => {
                info!(
                    session = %session.id,
                    round,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    tokens_used = ?reply.tokens_used,
                    "reasoning reply received"
                );
                debug!(preview = %preview(&reply.content), "reply preview");
                reply
            }
            Ok(Ok(reply)) => {
                warn!(session = %session.id, "reasoning service returned an empty reply");
                ReasoningReply {
                    content: self.rules.phrasing.empty_reply.to_string(),
                    ..reply
                }
            }
            Ok(Err(e)) => {
                warn!(session = %session.id, error = %e, "reasoning service failed; using fallback reply");
                fallback(self.rules.phrasing.fallback_reply)
            }
            Err(_) => {
                warn!(session = %session.id, timeout_secs, "reasoning service timed out; using fallback reply");
                fallback(self.rules.phrasing.fallback_reply)
            }
        }
    }

    /// Answer a report request with an echo and remember what it asked for.
    async fn clarify(
        &self,
        session: &Session,
        message: &str,
        intent: Intent,
        topic_tag: Option<String>,
    ) -> Result<SubmitOutcome, AdvisorError> {
        let kind = if intent == Intent::DiscussionSummaryRequest {
            PendingKind::DiscussionSummary {
                theme: self.resolver.extract_discussion_theme(message),
            }
        } else {
            let transcript = self.turns.all(&session.id).await;
            self.bind_request(&transcript, message)
        };
        let subject = compose::subject(&kind, message, &self.rules);
        let echo = compose::echo(&subject, &self.rules);

        let outcome = self
            .store_exchange(session, message, echo, topic_tag, intent, None)
            .await?;
        info!(session = %session.id, kind = ?kind, subject = %subject, "report request awaiting confirmation");
        self.ledger
            .open(PendingRequest::new(&session.id, kind, message))
            .await;
        Ok(outcome)
    }

    fn target(&self, turn: &Turn) -> TargetTurn {
        TargetTurn {
            order_index: turn.order_index,
            title: self.resolver.title_of(turn),
        }
    }

    /// Bind a report request to the answer it refers to.
    fn bind_request(&self, transcript: &[Turn], message: &str) -> PendingKind {
        match self.resolver.extract(message) {
            Reference::Topic { text, title_only } => {
                match self
                    .resolver
                    .find_turn_by_reference(transcript, &text, title_only)
                {
                    Some(turn) => PendingKind::DirectEcho {
                        target: Some(self.target(turn)),
                        topic: Some(text),
                        immediate: false,
                    },
                    None => {
                        debug!(topic = %text, "no answer matches the topic; summarizing by topic");
                        PendingKind::UserTopicFallback { topic: text }
                    }
                }
            }
            reference => PendingKind::DirectEcho {
                topic: None,
                target: self
                    .resolver
                    .latest_answer(transcript)
                    .map(|t| self.target(t)),
                immediate: reference == Reference::Immediate,
            },
        }
    }

    /// Produce the report a confirmation asked for and answer with a receipt.
    async fn confirm(
        &self,
        session: &Session,
        message: &str,
        pending: PendingRequest,
        topic_tag: Option<String>,
    ) -> Result<SubmitOutcome, AdvisorError> {
        let transcript = self.turns.all(&session.id).await;
        let subject = compose::subject(&pending.kind, &pending.raw_message, &self.rules);
        let report = self.produce_report(session, &pending.kind, &transcript, subject.clone());
        let receipt = compose::receipt(&subject, &self.rules);

        let outcome = self
            .store_exchange(
                session,
                message,
                receipt,
                topic_tag,
                Intent::Confirmation,
                Some(report.clone()),
            )
            .await?;
        info!(
            session = %session.id,
            report_id = %report.id,
            source = ?report.source,
            pending_since = %pending.opened_at,
            "pending report confirmed"
        );
        self.shelf.put(report).await;
        Ok(outcome)
    }

    fn produce_report(
        &self,
        session: &Session,
        kind: &PendingKind,
        transcript: &[Turn],
        title: String,
    ) -> Report {
        let round = rounds::active_round(session);
        let answer_report = |turn: &Turn| {
            Report::new(
                &session.id,
                title.clone(),
                turn.content.clone(),
                ReportSource::Answer {
                    order_index: turn.order_index,
                },
                round,
            )
        };
        let themed_report = |theme: Option<&str>, source: ReportSource| {
            let collected = collect_by_theme(transcript, theme, &self.rules);
            let body = if collected.is_empty() {
                self.rules.phrasing.no_conversation.to_string()
            } else {
                format_transcript(&collected, &self.rules)
            };
            Report::new(&session.id, title.clone(), body, source, round)
        };

        match kind {
            PendingKind::DirectEcho {
                target: Some(target),
                ..
            } => match transcript
                .iter()
                .find(|t| t.order_index == target.order_index)
            {
                Some(turn) => answer_report(turn),
                None => themed_report(None, ReportSource::Discussion { theme: None }),
            },
            PendingKind::DirectEcho {
                topic: Some(topic),
                ..
            } => match self.resolver.find_turn_by_reference(transcript, topic, false) {
                Some(turn) => answer_report(turn),
                None => themed_report(
                    Some(topic.as_str()),
                    ReportSource::UserTopic {
                        topic: topic.clone(),
                    },
                ),
            },
            PendingKind::DirectEcho { .. } => match self.resolver.latest_answer(transcript) {
                Some(turn) => answer_report(turn),
                None => Report::new(
                    &session.id,
                    title.clone(),
                    String::new(),
                    ReportSource::Discussion { theme: None },
                    round,
                ),
            },
            PendingKind::DiscussionSummary { theme } => themed_report(
                theme.as_deref(),
                ReportSource::Discussion {
                    theme: theme.clone(),
                },
            ),
            PendingKind::UserTopicFallback { topic } => themed_report(
                Some(topic.as_str()),
                ReportSource::UserTopic {
                    topic: topic.clone(),
                },
            ),
        }
    }

    async fn touch(&self, session_id: &str) {
        if let Err(e) = self.sessions.touch(session_id).await {
            warn!(session = %session_id, error = %e, "failed to update session activity");
        }
    }

    fn outcome(
        &self,
        intent: Intent,
        session: &Session,
        turns: &[Turn],
        continuation_id: Option<String>,
        report: Option<Report>,
    ) -> SubmitOutcome {
        SubmitOutcome {
            intent,
            turns: turns.iter().map(|t| map_turn(t, &self.rules)).collect(),
            current_round: session.current_round,
            round_cap: session.round_cap,
            limit_reached: rounds::is_limit_reached(session),
            continuation_id,
            report,
        }
    }
}

use std::sync::Arc;

use serde::Serialize;

use crate::rules::RuleSet;

const CONFIRMATION_MAX_CHARS: usize = 50;
const REPORT_REQUEST_MIN_CHARS: usize = 2;
const DISCUSSION_SUMMARY_MIN_CHARS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Intent {
    PlainQuery,
    ReportRequest,
    DiscussionSummaryRequest,
    Confirmation,
}

/// Rule-based intent detection. The checks run in a fixed priority because
/// the categories overlap: a short affirmative wins over everything, and a
/// discussion summary wins over a plain report request.
pub struct IntentClassifier {
    rules: Arc<RuleSet>,
}

impl IntentClassifier {
    pub fn new(rules: Arc<RuleSet>) -> Self {
        Self { rules }
    }

    pub fn classify(&self, message: &str) -> Intent {
        if self.is_confirmation(message) {
            Intent::Confirmation
        } else if self.is_discussion_summary_request(message) {
            Intent::DiscussionSummaryRequest
        } else if self.is_report_request(message) {
            Intent::ReportRequest
        } else {
            Intent::PlainQuery
        }
    }

    pub fn is_confirmation(&self, message: &str) -> bool {
        let trimmed = message.trim();
        trimmed.chars().count() <= CONFIRMATION_MAX_CHARS
            && self.rules.confirmation.iter().any(|re| re.is_match(trimmed))
    }

    /// "How do I write a good report?" asks about reports, it does not order one.
    fn is_question(&self, trimmed: &str) -> bool {
        self.rules
            .question_opener
            .iter()
            .any(|re| re.is_match(trimmed))
    }

    pub fn is_discussion_summary_request(&self, message: &str) -> bool {
        let trimmed = message.trim();
        trimmed.chars().count() >= DISCUSSION_SUMMARY_MIN_CHARS
            && !self.is_question(trimmed)
            && self
                .rules
                .discussion_summary
                .iter()
                .any(|re| re.is_match(trimmed))
    }

    pub fn is_report_request(&self, message: &str) -> bool {
        let trimmed = message.trim();
        trimmed.chars().count() >= REPORT_REQUEST_MIN_CHARS
            && !self.is_question(trimmed)
            && self.rules.report_request.iter().any(|re| re.is_match(trimmed))
    }
}

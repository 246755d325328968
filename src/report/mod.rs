//! Two-phase "turn an answer into a report" workflow: classify the request,
//! resolve what it points at, echo it back, and produce the report once the
//! user confirms.

pub mod classify;
pub mod compose;
pub mod ledger;
pub mod reference;
pub mod shelf;

pub use classify::{Intent, IntentClassifier};
pub use ledger::{PendingKind, PendingLedger, PendingRequest, TargetTurn};
pub use reference::{Reference, ReferenceResolver};
pub use shelf::{Report, ReportShelf, ReportSource};

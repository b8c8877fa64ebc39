//! Domain types for the interpretation pipeline
//!
//! Core aggregates: InterpretationSession, Question, Answer, plus the
//! diagnostic snapshot, draft/report documents, and action-planning types.
//! Persisted types implement the sessionstore Record trait.

mod action;
mod diagnostic;
mod draft;
mod id;
mod question;
mod session;

pub use action::{
    ActionPlan, ActionRationale, CandidateAction, CapacityBand, CapacityCaps, CapacityResult, ExpertAction,
    PlannedAction, Timeline,
};
pub use diagnostic::{CriticalFailure, DiagnosticInput, FailedGate, Objective};
pub use draft::{Draft, DraftSection, EvidenceRef, QualityRating, Report, SectionKind};
pub use id::generate_id;
pub use question::{Answer, AnswerConfidence, AnswerValue, CandidateQuestion, Gap, Question, QuestionType};
pub use session::{InterpretationSession, PlanningInputs, SessionStatus};

// Re-export sessionstore types for convenience
pub use sessionstore::{Filter, FilterOp, IndexValue, Record, Store};

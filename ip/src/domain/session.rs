//! InterpretationSession aggregate
//!
//! One session per run drives the draft/critique rounds. Every legal status
//! transition is enumerated in [`SessionStatus::can_transition_to`]; nothing
//! else mutates a session's status.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sessionstore::{IndexValue, Record, now_ms};

use super::action::CapacityBand;
use super::diagnostic::DiagnosticInput;
use super::draft::{Draft, Report};
use super::id::generate_id;

/// Pipeline status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, generation not yet started
    #[default]
    Pending,
    /// Draft generation in flight
    Generating,
    /// Draft critiqued, deciding between questions and finalization
    Assessed,
    /// Suspended on outstanding user questions
    AwaitingUser,
    /// Final polish pass in flight
    Finalizing,
    /// Report persisted
    Complete,
    /// Unrecoverable collaborator error
    Failed,
}

impl SessionStatus {
    /// The transition table of the pipeline state machine
    ///
    /// `Failed` is reachable from every non-terminal state; nothing leaves a
    /// terminal state (restart deletes and recreates instead).
    pub fn can_transition_to(&self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, Assessed)
                | (Assessed, AwaitingUser)
                | (Assessed, Finalizing)
                | (AwaitingUser, Generating)
                | (Finalizing, Generating)
                | (Finalizing, Complete)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Complete | SessionStatus::Failed)
    }

    pub fn is_awaiting_user(&self) -> bool {
        matches!(self, SessionStatus::AwaitingUser)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Generating => write!(f, "generating"),
            Self::Assessed => write!(f, "assessed"),
            Self::AwaitingUser => write!(f, "awaiting_user"),
            Self::Finalizing => write!(f, "finalizing"),
            Self::Complete => write!(f, "complete"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Caller-stated planning inputs captured at pipeline start
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanningInputs {
    /// Capacity band stated by the caller; inferred when absent
    #[serde(default)]
    pub stated_band: Option<CapacityBand>,

    /// Objective IDs the caller wants prioritized
    #[serde(default)]
    pub priority_focus: Vec<String>,
}

/// One interpretation pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpretationSession {
    /// Unique session identifier
    pub id: String,

    /// Assessment run this session interprets (unique: at most one live
    /// session per run)
    pub run_id: String,

    pub status: SessionStatus,

    /// Question rounds asked so far
    pub current_round: u32,

    /// Total questions asked across all rounds; monotone non-decreasing
    pub total_questions_asked: u32,

    /// Immutable diagnostic snapshot from the scoring collaborator
    pub diagnostic: DiagnosticInput,

    /// Caller-stated planning inputs
    #[serde(default)]
    pub planning: PlanningInputs,

    /// Latest generated draft
    #[serde(default)]
    pub draft: Option<Draft>,

    /// Rewrite instructions carried into the next generation round; dropped
    /// gaps resurface here instead of as questions
    #[serde(default)]
    pub rewrite_instructions: Vec<String>,

    /// Final report; set only in `complete`
    #[serde(default)]
    pub report: Option<Report>,

    /// Failure cause; set only in `failed`
    #[serde(default)]
    pub error: Option<String>,

    pub created_at: i64,
    pub updated_at: i64,
}

impl InterpretationSession {
    /// Fresh pending session for a run
    pub fn new(run_id: impl Into<String>, diagnostic: DiagnosticInput, planning: PlanningInputs) -> Self {
        let run_id = run_id.into();
        let now = now_ms();
        Self {
            id: generate_id("session", &run_id),
            run_id,
            status: SessionStatus::Pending,
            current_round: 0,
            total_questions_asked: 0,
            diagnostic,
            planning,
            draft: None,
            rewrite_instructions: Vec::new(),
            report: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a transition if the table allows it
    ///
    /// Returns false (leaving the session untouched) for an illegal edge.
    pub fn transition_to(&mut self, next: SessionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = now_ms();
        true
    }

    /// Move to `failed` with a cause; legal from any non-terminal state
    pub fn fail(&mut self, cause: impl Into<String>) -> bool {
        if !self.transition_to(SessionStatus::Failed) {
            return false;
        }
        self.error = Some(cause.into());
        true
    }

    pub fn set_draft(&mut self, draft: Draft) {
        self.draft = Some(draft);
        self.updated_at = now_ms();
    }

    /// Replace the instructions carried into the next generation round
    pub fn set_rewrite_instructions(&mut self, instructions: Vec<String>) {
        self.rewrite_instructions = instructions;
        self.updated_at = now_ms();
    }

    pub fn set_report(&mut self, report: Report) {
        self.report = Some(report);
        self.updated_at = now_ms();
    }

    /// Account for a delivered round of questions
    pub fn record_round(&mut self, questions_asked: u32) {
        self.current_round += 1;
        self.total_questions_asked += questions_asked;
        self.updated_at = now_ms();
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Budget and round invariants that must hold at every observed state
    pub fn check_invariants(&self, max_questions_total: u32, max_rounds: u32) -> bool {
        self.total_questions_asked <= max_questions_total && self.current_round <= max_rounds
    }
}

impl Record for InterpretationSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "sessions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("run_id".to_string(), IndexValue::String(self.run_id.clone()));
        fields.insert("status".to_string(), IndexValue::String(self.status.to_string()));
        fields
    }

    fn unique_fields() -> &'static [&'static str] {
        &["run_id"]
    }
}

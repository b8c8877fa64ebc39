//! interpipe - adaptive interpretation pipeline
//!
//! Orchestrates rounds of draft generation and critique over a maturity
//! diagnostic, asks the end user a strictly bounded number of clarifying
//! questions, and emits an evidence-grounded report with a
//! capacity-constrained action plan.
//!
//! # Core Concepts
//!
//! - **State in the store, never in memory**: every transition re-reads the
//!   persisted session and writes it back before returning, so stateless
//!   request handlers can drive the machine
//! - **Bounded user burden**: question budgets and round limits are hard
//!   circuit breakers, not suggestions
//! - **Untrusted collaborators**: LLM responses are decoded tolerantly at
//!   the boundary and audited against the run's evidence set
//!
//! # Modules
//!
//! - [`domain`] - session, question/answer, draft, and action types
//! - [`collab`] - DraftGenerator/DraftCritic traits and LLM-backed impls
//! - [`pipeline`] - the orchestrator state machine and its decision parts
//! - [`planner`] - capacity-bounded action planning
//! - [`state`] - the StateManager actor over the session store
//! - [`service`] - the caller-facing facade
//! - [`llm`] - completion transport
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod collab;
pub mod config;
pub mod domain;
pub mod llm;
pub mod pipeline;
pub mod planner;
pub mod prompts;
pub mod service;
pub mod state;

// Re-export commonly used types
pub use config::{CapacityConfig, Config, LlmConfig, PipelineConfig, StorageConfig};
pub use domain::{
    ActionPlan, Answer, AnswerConfidence, AnswerValue, CandidateAction, CapacityBand, CapacityResult,
    DiagnosticInput, Draft, Gap, InterpretationSession, PlanningInputs, Question, QuestionType, Report,
    SessionStatus,
};
pub use pipeline::{AnswerSubmission, PipelineError, PipelineOrchestrator, PipelineOutcome};
pub use service::{PipelineService, StartRequest};
pub use state::{PipelineMetrics, StateManager};

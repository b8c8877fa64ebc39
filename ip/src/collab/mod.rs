//! Collaborator interfaces
//!
//! DraftGenerator and DraftCritic are the pipeline's two external
//! collaborators. The traits are the seam: the orchestrator never sees a
//! transport, only these calls and their typed, already-validated results.

use async_trait::async_trait;
use thiserror::Error;

mod critic;
mod generator;
pub mod schema;

pub use critic::LlmDraftCritic;
pub use generator::LlmDraftGenerator;

use crate::domain::{CandidateQuestion, DiagnosticInput, Draft, Gap, QualityRating};
use crate::llm::LlmError;
use crate::prompts::AnswerLine;

/// Errors from collaborator calls
#[derive(Debug, Error)]
pub enum CollabError {
    #[error("LLM transport error: {0}")]
    Llm(#[from] LlmError),

    #[error("Prompt rendering error: {0}")]
    Prompt(String),
}

impl CollabError {
    /// Whether the pipeline may retry this call once with the same inputs
    pub fn is_retryable(&self) -> bool {
        match self {
            CollabError::Llm(e) => e.is_retryable(),
            CollabError::Prompt(_) => false,
        }
    }
}

/// A critic assessment of one draft round
#[derive(Debug, Clone, Default)]
pub struct Assessment {
    pub gaps: Vec<Gap>,
    pub overall_quality: QualityRating,
    pub rewrite_instructions: Vec<String>,
    pub generated_questions: Vec<CandidateQuestion>,
}

/// The critic's final polish verdict
#[derive(Debug, Clone, Default)]
pub struct FinalReview {
    pub ready: bool,
    pub edits: Vec<String>,
    pub forbidden_matches: Vec<String>,
}

/// Produces a structured five-section draft with evidence citations
#[async_trait]
pub trait DraftGenerator: Send + Sync {
    /// Generate a draft from the diagnostic, prior answers, and any rewrite
    /// instructions carried over from the last critique
    async fn generate(
        &self,
        diagnostic: &DiagnosticInput,
        answers: &[AnswerLine],
        rewrite_instructions: &[String],
    ) -> Result<Draft, CollabError>;
}

/// Critiques drafts and gates the final report
#[async_trait]
pub trait DraftCritic: Send + Sync {
    /// Review a draft: gaps, quality, rewrite instructions, candidate
    /// questions
    async fn assess(&self, draft: &Draft, diagnostic: &DiagnosticInput) -> Result<Assessment, CollabError>;

    /// Final polish pass before the report ships
    async fn finalize(&self, draft: &Draft) -> Result<FinalReview, CollabError>;
}

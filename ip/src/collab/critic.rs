//! LLM-backed draft critic

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Assessment, CollabError, DraftCritic, FinalReview, schema};
use crate::domain::{DiagnosticInput, Draft};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{self, AssessContext, FinalContext, embedded};

/// Max tokens for an assessment round
const ASSESS_MAX_TOKENS: u32 = 2048;

/// Max tokens for the final verdict
const FINAL_MAX_TOKENS: u32 = 1024;

/// Draft critic backed by LLM completion calls
pub struct LlmDraftCritic {
    llm: Arc<dyn LlmClient>,

    /// Phrases the final gate must flag
    forbidden_phrases: Vec<String>,
}

impl LlmDraftCritic {
    pub fn new(llm: Arc<dyn LlmClient>, forbidden_phrases: Vec<String>) -> Self {
        Self { llm, forbidden_phrases }
    }

    fn render_draft(draft: &Draft) -> String {
        let mut out = String::new();
        for section in &draft.sections {
            out.push_str(&format!("## {}\n\n{}\n\n", section.kind, section.body));
            if !section.evidence_ids.is_empty() {
                out.push_str(&format!("Evidence: {}\n\n", section.evidence_ids.join(", ")));
            }
        }
        out
    }
}

#[async_trait]
impl DraftCritic for LlmDraftCritic {
    async fn assess(&self, draft: &Draft, diagnostic: &DiagnosticInput) -> Result<Assessment, CollabError> {
        let context = AssessContext {
            diagnostic: prompts::describe_diagnostic(diagnostic),
            draft: Self::render_draft(draft),
        };
        let prompt =
            prompts::render(embedded::CRITIC_ASSESS_USER, &context).map_err(|e| CollabError::Prompt(e.to_string()))?;

        let request = CompletionRequest {
            system_prompt: embedded::CRITIC_SYSTEM.to_string(),
            messages: vec![Message::user(prompt)],
            max_tokens: ASSESS_MAX_TOKENS,
        };

        let response = self.llm.complete(request).await?;
        let text = response.content.unwrap_or_default();
        debug!(response_len = text.len(), "Critic assess responded");

        // Unparseable critique falls back to a neutral assessment; the
        // pipeline proceeds rather than failing the round
        let assessment = match schema::extract_json(&text) {
            Some(value) => schema::decode_assessment(&value),
            None => {
                warn!("Critic assess response was not JSON; using fallback assessment");
                Assessment::default()
            }
        };
        Ok(assessment)
    }

    async fn finalize(&self, draft: &Draft) -> Result<FinalReview, CollabError> {
        let context = FinalContext {
            draft: Self::render_draft(draft),
            forbidden_phrases: self.forbidden_phrases.join(", "),
        };
        let prompt =
            prompts::render(embedded::CRITIC_FINAL_USER, &context).map_err(|e| CollabError::Prompt(e.to_string()))?;

        let request = CompletionRequest {
            system_prompt: embedded::CRITIC_SYSTEM.to_string(),
            messages: vec![Message::user(prompt)],
            max_tokens: FINAL_MAX_TOKENS,
        };

        let response = self.llm.complete(request).await?;
        let text = response.content.unwrap_or_default();
        debug!(response_len = text.len(), "Critic finalize responded");

        let review = match schema::extract_json(&text) {
            Some(value) => schema::decode_final_review(&value),
            None => {
                warn!("Critic finalize response was not JSON; using fallback verdict");
                FinalReview::default()
            }
        };
        Ok(review)
    }
}

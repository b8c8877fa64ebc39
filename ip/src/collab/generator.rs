//! LLM-backed draft generator

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{CollabError, DraftGenerator, schema};
use crate::domain::{DiagnosticInput, Draft};
use crate::llm::{CompletionRequest, LlmClient, Message};
use crate::prompts::{self, AnswerLine, GeneratorContext, embedded};

/// Max tokens for a generation round
const GENERATE_MAX_TOKENS: u32 = 4096;

/// Draft generator backed by an LLM completion call
pub struct LlmDraftGenerator {
    llm: Arc<dyn LlmClient>,
}

impl LlmDraftGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl DraftGenerator for LlmDraftGenerator {
    async fn generate(
        &self,
        diagnostic: &DiagnosticInput,
        answers: &[AnswerLine],
        rewrite_instructions: &[String],
    ) -> Result<Draft, CollabError> {
        let mut evidence_ids: Vec<String> = diagnostic.evidence_set().into_iter().collect();
        evidence_ids.sort();

        let context = GeneratorContext {
            diagnostic: prompts::describe_diagnostic(diagnostic),
            evidence_ids,
            answers: answers.to_vec(),
            rewrite_instructions: rewrite_instructions.to_vec(),
        };
        let prompt =
            prompts::render(embedded::GENERATOR_USER, &context).map_err(|e| CollabError::Prompt(e.to_string()))?;

        let request = CompletionRequest {
            system_prompt: embedded::GENERATOR_SYSTEM.to_string(),
            messages: vec![Message::user(prompt)],
            max_tokens: GENERATE_MAX_TOKENS,
        };

        let response = self.llm.complete(request).await?;
        let text = response.content.unwrap_or_default();
        debug!(response_len = text.len(), answers = answers.len(), "Generator responded");

        // Whatever came back is decoded tolerantly; a malformed response
        // yields a padded draft the critic will tear apart, not a dead round
        let draft = match schema::extract_json(&text) {
            Some(value) => schema::decode_draft(&value),
            None => {
                warn!("Generator response was not JSON; falling back to empty draft");
                Draft::empty()
            }
        };
        Ok(draft)
    }
}

//! QuestionBudgetAllocator - the question circuit breaker
//!
//! Caps how many clarifying questions may be asked, per round and in total,
//! and cuts questioning off entirely once the round limit is reached. The
//! cutoff is unconditional: high-severity gaps do not override it.

use tracing::debug;

use crate::config::PipelineConfig;
use crate::domain::CandidateQuestion;

/// Enforces the question budget for one session
#[derive(Debug, Clone)]
pub struct QuestionBudgetAllocator {
    max_questions_total: u32,
    max_questions_per_round: u32,
    max_rounds: u32,
}

impl QuestionBudgetAllocator {
    pub fn new(max_questions_total: u32, max_questions_per_round: u32, max_rounds: u32) -> Self {
        Self {
            max_questions_total,
            max_questions_per_round,
            max_rounds,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.max_questions_total,
            config.max_questions_per_round,
            config.max_rounds,
        )
    }

    /// Keep the first `min(per-round cap, remaining budget)` ranked
    /// candidates; the rest are dropped, not deferred
    ///
    /// Once `current_round` reaches the round limit the result is forced
    /// empty regardless of what the critic proposed, which routes the
    /// pipeline into finalization.
    pub fn allocate(
        &self,
        ranked: Vec<CandidateQuestion>,
        total_questions_asked: u32,
        current_round: u32,
    ) -> Vec<CandidateQuestion> {
        if current_round >= self.max_rounds {
            debug!(current_round, max_rounds = self.max_rounds, "Round limit reached; no questions");
            return Vec::new();
        }

        let remaining = self.max_questions_total.saturating_sub(total_questions_asked);
        let cap = self.max_questions_per_round.min(remaining) as usize;

        debug!(
            candidates = ranked.len(),
            total_questions_asked, remaining, cap, "Allocating question budget"
        );

        let mut kept = ranked;
        kept.truncate(cap);
        kept
    }
}

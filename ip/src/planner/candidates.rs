//! Candidate action derivation
//!
//! Turns the diagnostic snapshot into the read-only CandidateAction list the
//! capacity planner consumes. Derived once per run; deterministic for a
//! given diagnostic.

use tracing::debug;

use crate::domain::{CandidateAction, DiagnosticInput, ExpertAction};

/// Objectives scoring below this are remediation candidates even without a
/// critical failure or blocked gate
const CANDIDATE_SCORE_THRESHOLD: u32 = 60;

/// Derive remediation candidates from the diagnostic
///
/// An objective becomes a candidate when it carries a critical failure,
/// blocks a maturity gate, or scores below the threshold. Order follows the
/// diagnostic's objective order.
pub fn derive_candidates(diagnostic: &DiagnosticInput) -> Vec<CandidateAction> {
    let mut candidates = Vec::new();

    for obj in &diagnostic.objectives {
        let is_critical =
            obj.has_critical_failure || diagnostic.critical_failures.iter().any(|cf| cf.objective_id == obj.id);

        let gates = diagnostic.gates_for(&obj.id);
        let is_gate_blocker = !gates.is_empty();
        let gate_level = gates.first().map(|g| g.level);

        if !is_critical && !is_gate_blocker && obj.score >= CANDIDATE_SCORE_THRESHOLD {
            continue;
        }

        let expert_action = obj.expert_action.clone().unwrap_or_else(|| ExpertAction {
            title: format!("Strengthen {}", obj.name),
            recommendation: format!(
                "Raise '{}' from its current score of {} by closing the weakest practices first.",
                obj.name, obj.score
            ),
        });

        candidates.push(CandidateAction {
            question_id: obj.question_id.clone().unwrap_or_default(),
            objective_id: obj.id.clone(),
            objective_score: obj.score,
            is_critical,
            is_gate_blocker,
            gate_level,
            expert_action,
        });
    }

    debug!(
        objectives = diagnostic.objectives.len(),
        candidates = candidates.len(),
        "Derived remediation candidates"
    );
    candidates
}

//! Diagnostic input from the scoring collaborator
//!
//! An immutable snapshot of the objective scores, critical failures, and
//! failed gates for one assessment run. Captured once at pipeline start and
//! persisted on the session so every later request resumes from storage.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::action::ExpertAction;

/// One scored objective from the diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Objective {
    /// Stable objective identifier (e.g. "governance.roles")
    pub id: String,

    /// Human-readable name
    pub name: String,

    /// Objective score, 0-100
    pub score: u32,

    /// Relative weight of this objective in the diagnostic
    #[serde(default)]
    pub importance: u32,

    /// True if any critical failure was recorded against this objective
    #[serde(default)]
    pub has_critical_failure: bool,

    /// Intake question that produced this objective's data
    #[serde(default)]
    pub question_id: Option<String>,

    /// Remediation guidance supplied by the scoring side, if any
    #[serde(default)]
    pub expert_action: Option<ExpertAction>,
}

/// A critical failure recorded by the diagnostic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriticalFailure {
    /// Objective the failure was recorded against
    pub objective_id: String,

    /// What failed
    pub description: String,
}

/// A maturity gate the run did not pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedGate {
    /// Stable gate identifier
    pub gate_id: String,

    /// Maturity level this gate blocks advancement to
    pub level: u8,

    /// Objective whose score blocked the gate
    pub objective_id: String,

    /// What the gate requires
    pub description: String,
}

/// Immutable diagnostic input for one pipeline run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiagnosticInput {
    #[serde(default)]
    pub objectives: Vec<Objective>,

    #[serde(default)]
    pub critical_failures: Vec<CriticalFailure>,

    #[serde(default)]
    pub failed_gates: Vec<FailedGate>,
}

impl DiagnosticInput {
    /// The set of evidence IDs a narrative claim is allowed to cite
    ///
    /// Every objective, critical failure, and failed gate contributes one
    /// opaque token. Anything outside this set is an unknown citation.
    pub fn evidence_set(&self) -> HashSet<String> {
        let mut ids = HashSet::new();
        for obj in &self.objectives {
            ids.insert(format!("obj-{}", obj.id));
        }
        for cf in &self.critical_failures {
            ids.insert(format!("cf-{}", cf.objective_id));
        }
        for gate in &self.failed_gates {
            ids.insert(format!("gate-{}", gate.gate_id));
        }
        ids
    }

    /// Look up an objective by ID
    pub fn objective(&self, id: &str) -> Option<&Objective> {
        self.objectives.iter().find(|o| o.id == id)
    }

    /// Failed gates blocking a given objective, nearest level first
    pub fn gates_for(&self, objective_id: &str) -> Vec<&FailedGate> {
        let mut gates: Vec<&FailedGate> = self
            .failed_gates
            .iter()
            .filter(|g| g.objective_id == objective_id)
            .collect();
        gates.sort_by_key(|g| g.level);
        gates
    }

    /// Human-readable source description for an evidence ID, if known
    pub fn describe_evidence(&self, evidence_id: &str) -> Option<String> {
        if let Some(id) = evidence_id.strip_prefix("obj-") {
            return self
                .objective(id)
                .map(|o| format!("objective '{}' scored {}", o.name, o.score));
        }
        if let Some(id) = evidence_id.strip_prefix("cf-") {
            return self
                .critical_failures
                .iter()
                .find(|cf| cf.objective_id == id)
                .map(|cf| format!("critical failure: {}", cf.description));
        }
        if let Some(id) = evidence_id.strip_prefix("gate-") {
            return self
                .failed_gates
                .iter()
                .find(|g| g.gate_id == id)
                .map(|g| format!("failed level-{} gate: {}", g.level, g.description));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn sample() -> DiagnosticInput {
        DiagnosticInput {
            objectives: vec![
                Objective {
                    id: "gov.roles".to_string(),
                    name: "Governance roles".to_string(),
                    score: 35,
                    importance: 3,
                    has_critical_failure: true,
                    question_id: Some("q-gov-1".to_string()),
                    expert_action: None,
                },
                Objective {
                    id: "ops.backup".to_string(),
                    name: "Backup operations".to_string(),
                    score: 80,
                    importance: 2,
                    has_critical_failure: false,
                    question_id: Some("q-ops-4".to_string()),
                    expert_action: None,
                },
            ],
            critical_failures: vec![CriticalFailure {
                objective_id: "gov.roles".to_string(),
                description: "No designated data owner".to_string(),
            }],
            failed_gates: vec![FailedGate {
                gate_id: "g2-governance".to_string(),
                level: 2,
                objective_id: "gov.roles".to_string(),
                description: "Level 2 requires documented ownership".to_string(),
            }],
        }
    }

    #[test]
    fn test_evidence_set() {
        let input = sample();
        let evidence = input.evidence_set();
        assert!(evidence.contains("obj-gov.roles"));
        assert!(evidence.contains("obj-ops.backup"));
        assert!(evidence.contains("cf-gov.roles"));
        assert!(evidence.contains("gate-g2-governance"));
        assert_eq!(evidence.len(), 4);
    }

    #[test]
    fn test_gates_for_sorted_by_level() {
        let mut input = sample();
        input.failed_gates.push(FailedGate {
            gate_id: "g1-governance".to_string(),
            level: 1,
            objective_id: "gov.roles".to_string(),
            description: "Level 1 requires any ownership statement".to_string(),
        });

        let gates = input.gates_for("gov.roles");
        assert_eq!(gates.len(), 2);
        assert_eq!(gates[0].level, 1);
        assert_eq!(gates[1].level, 2);
    }

    #[test]
    fn test_describe_evidence() {
        let input = sample();
        assert!(input.describe_evidence("obj-gov.roles").unwrap().contains("35"));
        assert!(input.describe_evidence("cf-gov.roles").unwrap().contains("data owner"));
        assert!(input.describe_evidence("gate-g2-governance").unwrap().contains("level-2"));
        assert!(input.describe_evidence("obj-unknown").is_none());
        assert!(input.describe_evidence("bogus").is_none());
    }
}

//! Action planning types
//!
//! Candidate remediation actions derived from the diagnostic, the capacity
//! band sizing the plan, and the bucketed plan itself.

use serde::{Deserialize, Serialize};

/// Remediation guidance for one objective
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertAction {
    pub title: String,
    pub recommendation: String,
}

/// A remediation candidate considered by the capacity planner
///
/// Read-only input, derived once per run from the diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateAction {
    /// Intake question that produced the objective's data
    pub question_id: String,

    pub objective_id: String,

    /// Objective score, 0-100; lower scores are worse
    pub objective_score: u32,

    /// Critical candidates are never silently dropped
    #[serde(default)]
    pub is_critical: bool,

    /// True when the objective blocks a maturity gate
    #[serde(default)]
    pub is_gate_blocker: bool,

    /// Gate level when `is_gate_blocker` (lower = nearer)
    #[serde(default)]
    pub gate_level: Option<u8>,

    pub expert_action: ExpertAction,
}

/// How much remediation work a team can absorb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CapacityBand {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for CapacityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for CapacityBand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("Unknown capacity band: '{}'. Expected low, medium, or high", other)),
        }
    }
}

/// Action plan timeline buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeline {
    #[serde(rename = "6m")]
    SixMonths,
    #[serde(rename = "12m")]
    TwelveMonths,
    #[serde(rename = "24m")]
    TwentyFourMonths,
}

impl Timeline {
    /// All buckets in fill order
    pub const ALL: [Timeline; 3] = [Timeline::SixMonths, Timeline::TwelveMonths, Timeline::TwentyFourMonths];
}

impl std::fmt::Display for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SixMonths => write!(f, "6m"),
            Self::TwelveMonths => write!(f, "12m"),
            Self::TwentyFourMonths => write!(f, "24m"),
        }
    }
}

/// Cumulative per-timeline caps
///
/// The 12m cap bounds everything placed in 6m plus 12m; 24m bounds the
/// full plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityCaps {
    #[serde(rename = "6m")]
    pub six_months: u32,

    #[serde(rename = "12m")]
    pub twelve_months: u32,

    #[serde(rename = "24m")]
    pub twenty_four_months: u32,
}

impl CapacityCaps {
    pub fn new(six_months: u32, twelve_months: u32, twenty_four_months: u32) -> Self {
        Self {
            six_months,
            twelve_months,
            twenty_four_months,
        }
    }

    /// Cumulative cap through the given bucket
    pub fn through(&self, timeline: Timeline) -> u32 {
        match timeline {
            Timeline::SixMonths => self.six_months,
            Timeline::TwelveMonths => self.twelve_months,
            Timeline::TwentyFourMonths => self.twenty_four_months,
        }
    }

    /// Force the caps monotone non-decreasing across buckets
    pub fn normalized(self) -> Self {
        let six = self.six_months;
        let twelve = self.twelve_months.max(six);
        let twenty_four = self.twenty_four_months.max(twelve);
        Self::new(six, twelve, twenty_four)
    }

    /// True when caps are monotone non-decreasing
    pub fn is_monotone(&self) -> bool {
        self.six_months <= self.twelve_months && self.twelve_months <= self.twenty_four_months
    }
}

/// Resolved capacity for one plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapacityResult {
    pub band: CapacityBand,

    /// True when the band had to be inferred rather than stated
    pub assumed: bool,

    pub max_actions: CapacityCaps,
}

/// The mandatory rationale triple on every emitted action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRationale {
    pub why_selected: String,
    pub why_this_timeline: String,
    pub expected_impact: String,
}

impl ActionRationale {
    /// All three fields populated
    pub fn is_complete(&self) -> bool {
        !self.why_selected.trim().is_empty()
            && !self.why_this_timeline.trim().is_empty()
            && !self.expected_impact.trim().is_empty()
    }
}

/// One action placed in the plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    pub question_id: String,

    pub objective_id: String,

    pub timeline: Timeline,

    /// 1-based rank across the whole plan
    pub priority_rank: u32,

    /// Critical candidate placed beyond the 6m cap rather than dropped
    #[serde(default)]
    pub over_capacity: bool,

    pub expert_action: ExpertAction,

    pub rationale: ActionRationale,
}

/// The bounded, bucketed action plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionPlan {
    pub band: CapacityBand,

    /// True when the band was inferred rather than stated
    pub assumed: bool,

    /// Actions ordered by `priority_rank`
    pub actions: Vec<PlannedAction>,

    /// Candidates omitted by cap exhaustion (not an error)
    pub omitted: u32,
}

impl ActionPlan {
    /// Actions in a given timeline bucket
    pub fn bucket(&self, timeline: Timeline) -> Vec<&PlannedAction> {
        self.actions.iter().filter(|a| a.timeline == timeline).collect()
    }

    /// A plan with an incomplete rationale on any action is a defect
    pub fn validate(&self) -> Result<(), String> {
        for action in &self.actions {
            if !action.rationale.is_complete() {
                return Err(format!(
                    "Action for objective '{}' is missing rationale fields",
                    action.objective_id
                ));
            }
        }
        let mut expected = 1;
        for action in &self.actions {
            if action.priority_rank != expected {
                return Err(format!(
                    "Priority ranks not contiguous: expected {}, found {}",
                    expected, action.priority_rank
                ));
            }
            expected += 1;
        }
        Ok(())
    }
}

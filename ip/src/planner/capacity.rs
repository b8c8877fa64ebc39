//! ActionCapacityPlanner - bounded, bucketed action planning
//!
//! Turns the candidate list into a plan sized to the team's capacity band.
//! Placement order is strict: criticals first (never dropped, flagged when
//! beyond the 6m cap), then gate blockers into remaining 6m room, then the
//! general pool across 6m -> 12m -> 24m under cumulative caps.

use tracing::{debug, info};

use crate::config::CapacityConfig;
use crate::domain::{
    ActionPlan, ActionRationale, CandidateAction, CapacityBand, CapacityResult, PlannedAction, Timeline,
};

impl CapacityResult {
    /// Resolve the effective capacity for a plan
    ///
    /// `assumed` records that the band was inferred from config rather than
    /// stated by the caller.
    pub fn resolve(stated: Option<CapacityBand>, config: &CapacityConfig) -> Self {
        let (band, assumed) = match stated {
            Some(band) => (band, false),
            None => (config.default_band, true),
        };
        Self {
            band,
            assumed,
            max_actions: config.caps_for(band),
        }
    }
}

/// Builds the action plan for a completed pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct ActionCapacityPlanner;

impl ActionCapacityPlanner {
    /// Produce the plan
    ///
    /// `priority_focus` holds the caller's focus tags, matched against
    /// objective IDs.
    pub fn plan(&self, candidates: Vec<CandidateAction>, capacity: CapacityResult, priority_focus: &[String]) -> ActionPlan {
        let caps = capacity.max_actions.normalized();
        let total_candidates = candidates.len();

        let mut criticals: Vec<CandidateAction> = Vec::new();
        let mut gate_blockers: Vec<CandidateAction> = Vec::new();
        let mut general: Vec<CandidateAction> = Vec::new();

        for candidate in candidates {
            if candidate.is_critical {
                criticals.push(candidate);
            } else if candidate.is_gate_blocker {
                gate_blockers.push(candidate);
            } else {
                general.push(candidate);
            }
        }

        // Worst-scoring criticals first; ties broken by objective for
        // deterministic output
        criticals.sort_by(|a, b| {
            a.objective_score
                .cmp(&b.objective_score)
                .then_with(|| a.objective_id.cmp(&b.objective_id))
        });

        // Nearer gates first
        gate_blockers.sort_by(|a, b| {
            a.gate_level
                .unwrap_or(u8::MAX)
                .cmp(&b.gate_level.unwrap_or(u8::MAX))
                .then_with(|| a.objective_score.cmp(&b.objective_score))
                .then_with(|| a.objective_id.cmp(&b.objective_id))
        });

        let mut actions: Vec<PlannedAction> = Vec::new();

        // 1. Criticals force-place into 6m; overflow is flagged, never dropped
        let cap6 = caps.six_months as usize;
        for (i, candidate) in criticals.into_iter().enumerate() {
            let over_capacity = i >= cap6;
            let rationale = Self::rationale(&candidate, Timeline::SixMonths, over_capacity, false);
            actions.push(Self::place(candidate, Timeline::SixMonths, over_capacity, rationale));
        }
        let criticals_placed = actions.len();

        // 2. Gate blockers fill whatever 6m room the criticals left
        let room6 = cap6.saturating_sub(criticals_placed);
        let spill: Vec<CandidateAction> = if gate_blockers.len() > room6 {
            gate_blockers.split_off(room6)
        } else {
            Vec::new()
        };
        for candidate in gate_blockers {
            let rationale = Self::rationale(&candidate, Timeline::SixMonths, false, false);
            actions.push(Self::place(candidate, Timeline::SixMonths, false, rationale));
        }

        // 3. The general pool (plus unplaced gate blockers): focus matches
        //    first, then worst score first
        general.extend(spill);
        general.sort_by(|a, b| {
            let a_focus = priority_focus.contains(&a.objective_id);
            let b_focus = priority_focus.contains(&b.objective_id);
            b_focus
                .cmp(&a_focus)
                .then_with(|| a.objective_score.cmp(&b.objective_score))
                .then_with(|| a.objective_id.cmp(&b.objective_id))
        });

        let mut bucket_counts = [
            actions.iter().filter(|a| a.timeline == Timeline::SixMonths).count(),
            0usize,
            0usize,
        ];
        let mut omitted = 0u32;

        for candidate in general {
            let mut placed = false;
            for (i, timeline) in Timeline::ALL.into_iter().enumerate() {
                // Cumulative cap: everything placed through this bucket,
                // over-capacity criticals included
                let through: usize = bucket_counts[..=i].iter().sum();
                if through < caps.through(timeline) as usize {
                    let is_focus = priority_focus.contains(&candidate.objective_id);
                    let rationale = Self::rationale(&candidate, timeline, false, is_focus);
                    actions.push(Self::place(candidate.clone(), timeline, false, rationale));
                    bucket_counts[i] += 1;
                    placed = true;
                    break;
                }
            }
            // 4. Cap exhaustion: omitted, not an error
            if !placed {
                omitted += 1;
            }
        }

        // Rank across the final plan: 6m bucket in placement order, then 12m,
        // then 24m
        actions.sort_by_key(|a| match a.timeline {
            Timeline::SixMonths => 0,
            Timeline::TwelveMonths => 1,
            Timeline::TwentyFourMonths => 2,
        });
        for (i, action) in actions.iter_mut().enumerate() {
            action.priority_rank = (i + 1) as u32;
        }

        info!(
            band = %capacity.band,
            assumed = capacity.assumed,
            candidates = total_candidates,
            planned = actions.len(),
            omitted,
            "Action plan built"
        );
        debug!(caps = ?caps, "Effective capacity caps");

        ActionPlan {
            band: capacity.band,
            assumed: capacity.assumed,
            actions,
            omitted,
        }
    }

    fn place(candidate: CandidateAction, timeline: Timeline, over_capacity: bool, rationale: ActionRationale) -> PlannedAction {
        PlannedAction {
            question_id: candidate.question_id,
            objective_id: candidate.objective_id,
            timeline,
            priority_rank: 0, // assigned after all placement
            over_capacity,
            expert_action: candidate.expert_action,
            rationale,
        }
    }

    /// Every emitted action carries the full rationale triple
    fn rationale(candidate: &CandidateAction, timeline: Timeline, over_capacity: bool, is_focus: bool) -> ActionRationale {
        let why_selected = if candidate.is_critical {
            format!(
                "Objective '{}' carries a critical failure; critical items are always planned.",
                candidate.objective_id
            )
        } else if candidate.is_gate_blocker {
            match candidate.gate_level {
                Some(level) => format!(
                    "Objective '{}' blocks advancement to maturity level {}.",
                    candidate.objective_id, level
                ),
                None => format!("Objective '{}' blocks a maturity gate.", candidate.objective_id),
            }
        } else if is_focus {
            format!(
                "Objective '{}' is in the stated priority focus and scored {}.",
                candidate.objective_id, candidate.objective_score
            )
        } else {
            format!(
                "Objective '{}' scored {}, among the weakest results in this assessment.",
                candidate.objective_id, candidate.objective_score
            )
        };

        let why_this_timeline = match (timeline, over_capacity) {
            (Timeline::SixMonths, true) => {
                "Critical work beyond the 6-month capacity cap; kept in the near-term bucket and flagged so it is staffed rather than deferred.".to_string()
            }
            (Timeline::SixMonths, false) => {
                if candidate.is_critical {
                    "Critical failures are addressed in the first six months regardless of score.".to_string()
                } else if candidate.is_gate_blocker {
                    "Clearing the nearest blocked gate early unlocks the next maturity level.".to_string()
                } else {
                    "Fits within near-term capacity and addresses the weakest area first.".to_string()
                }
            }
            (Timeline::TwelveMonths, _) => {
                "Near-term capacity is committed to higher-priority work; scheduled for the second half-year.".to_string()
            }
            (Timeline::TwentyFourMonths, _) => {
                "Deferred behind higher-priority remediation; still within the planning horizon.".to_string()
            }
        };

        let expected_impact = if candidate.is_critical {
            format!(
                "Resolves a critical failure and removes the largest single risk to the '{}' objective.",
                candidate.objective_id
            )
        } else if let Some(level) = candidate.gate_level {
            format!("Unblocks the level-{} gate and raises the maturity ceiling.", level)
        } else {
            format!(
                "Raises the '{}' score from {} and lifts the overall maturity profile.",
                candidate.objective_id, candidate.objective_score
            )
        };

        ActionRationale {
            why_selected,
            why_this_timeline,
            expected_impact,
        }
    }
}

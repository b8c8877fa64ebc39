//! GapPrioritizer - ranks critic gaps and orders candidate questions
//!
//! Ranking is deterministic: a stable sort by severity with ties resolved by
//! critic order, so identical critic responses always produce identical
//! output. Gaps whose related evidence is already fully cited in the draft
//! are deprioritized; they signal redundant rather than missing information.

use std::collections::HashSet;

use tracing::debug;

use crate::domain::{CandidateQuestion, Draft, Gap};

/// Ranks gaps and selects the question order the allocator consumes
#[derive(Debug, Clone, Copy, Default)]
pub struct GapPrioritizer;

impl GapPrioritizer {
    /// Rank gaps by severity descending, redundant gaps last
    ///
    /// Both partitions keep the critic's original order among equals
    /// (stable sort), per the determinism requirement.
    pub fn rank(&self, gaps: &[Gap], draft: &Draft) -> Vec<Gap> {
        let cited = draft.cited_evidence();

        let (mut active, mut redundant): (Vec<Gap>, Vec<Gap>) =
            gaps.iter().cloned().partition(|gap| !Self::is_redundant(gap, &cited));

        active.sort_by_key(|gap| std::cmp::Reverse(gap.severity));
        redundant.sort_by_key(|gap| std::cmp::Reverse(gap.severity));

        debug!(
            total = gaps.len(),
            redundant = redundant.len(),
            "Ranked gaps for question selection"
        );

        active.extend(redundant);
        active
    }

    /// Order candidate questions by their gap's rank
    ///
    /// Questions within one gap keep critic order; questions whose gap the
    /// critic did not report are appended last, also in critic order.
    pub fn select_questions(&self, candidates: Vec<CandidateQuestion>, ranked_gaps: &[Gap]) -> Vec<CandidateQuestion> {
        let mut ordered = Vec::with_capacity(candidates.len());
        let mut placed = vec![false; candidates.len()];

        for gap in ranked_gaps {
            for (i, candidate) in candidates.iter().enumerate() {
                if !placed[i] && candidate.gap_id == gap.gap_id {
                    ordered.push(candidate.clone());
                    placed[i] = true;
                }
            }
        }

        for (i, candidate) in candidates.into_iter().enumerate() {
            if !placed[i] {
                ordered.push(candidate);
            }
        }

        ordered
    }

    fn is_redundant(gap: &Gap, cited: &HashSet<String>) -> bool {
        !gap.related_evidence_ids.is_empty() && gap.related_evidence_ids.iter().all(|id| cited.contains(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QuestionType, SectionKind};

    fn gap(id: &str, severity: u8, evidence: &[&str]) -> Gap {
        Gap {
            gap_id: id.to_string(),
            section: SectionKind::Risks,
            description: format!("gap {}", id),
            severity,
            related_evidence_ids: evidence.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn question(gap_id: &str, text: &str) -> CandidateQuestion {
        CandidateQuestion {
            gap_id: gap_id.to_string(),
            kind: QuestionType::FreeText,
            text: text.to_string(),
            options: Vec::new(),
            rationale: String::new(),
        }
    }

    #[test]
    fn test_rank_by_severity_descending() {
        let gaps = vec![gap("a", 2, &[]), gap("b", 5, &[]), gap("c", 4, &[])];
        let ranked = GapPrioritizer.rank(&gaps, &Draft::empty());

        let ids: Vec<&str> = ranked.iter().map(|g| g.gap_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_ties_keep_critic_order() {
        let gaps = vec![gap("first", 3, &[]), gap("second", 3, &[]), gap("third", 3, &[])];
        let ranked = GapPrioritizer.rank(&gaps, &Draft::empty());

        let ids: Vec<&str> = ranked.iter().map(|g| g.gap_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_redundant_gaps_deprioritized() {
        let mut draft = Draft::empty();
        draft.evidence_ids_used = vec!["obj-x".to_string(), "obj-y".to_string()];

        let gaps = vec![
            // Fully covered by draft evidence: redundant despite top severity
            gap("covered", 5, &["obj-x", "obj-y"]),
            gap("partial", 3, &["obj-x", "obj-missing"]),
            gap("unrelated", 2, &[]),
        ];

        let ranked = GapPrioritizer.rank(&gaps, &draft);
        let ids: Vec<&str> = ranked.iter().map(|g| g.gap_id.as_str()).collect();
        assert_eq!(ids, vec!["partial", "unrelated", "covered"]);
    }

    #[test]
    fn test_empty_evidence_set_is_not_redundant() {
        // A gap with no related evidence is missing information, not
        // redundant, even though "all of nothing" is trivially cited
        let gaps = vec![gap("none", 1, &[])];
        let ranked = GapPrioritizer.rank(&gaps, &Draft::empty());
        assert_eq!(ranked[0].gap_id, "none");
    }

    #[test]
    fn test_select_questions_follows_gap_rank() {
        let ranked = vec![gap("high", 5, &[]), gap("low", 1, &[])];
        let candidates = vec![
            question("low", "Low question?"),
            question("high", "High question?"),
            question("orphan", "Orphan question?"),
        ];

        let ordered = GapPrioritizer.select_questions(candidates, &ranked);
        let texts: Vec<&str> = ordered.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["High question?", "Low question?", "Orphan question?"]);
    }

    #[test]
    fn test_select_questions_deterministic() {
        let ranked = vec![gap("g", 3, &[])];
        let candidates = vec![question("g", "One?"), question("g", "Two?")];

        let a = GapPrioritizer.select_questions(candidates.clone(), &ranked);
        let b = GapPrioritizer.select_questions(candidates, &ranked);
        let texts_a: Vec<&str> = a.iter().map(|q| q.text.as_str()).collect();
        let texts_b: Vec<&str> = b.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts_a, texts_b);
        assert_eq!(texts_a, vec!["One?", "Two?"]);
    }
}

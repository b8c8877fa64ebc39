//! Evidence citation audit and forbidden-phrase scan
//!
//! The second validation layer of the quality gate: every cited evidence ID
//! must belong to the run's allowed set, and the narrative must not contain
//! any configured forbidden phrase. Unknown citations are surfaced, never
//! silently stripped.

use std::collections::HashSet;

use regex::RegexBuilder;
use tracing::warn;

use crate::domain::{DiagnosticInput, Draft, EvidenceRef};

/// Cited evidence IDs that are not in the allowed set, sorted
pub fn unknown_citations(draft: &Draft, allowed: &HashSet<String>) -> Vec<String> {
    let mut unknown: Vec<String> = draft
        .cited_evidence()
        .into_iter()
        .filter(|id| !allowed.contains(id))
        .collect();
    unknown.sort();
    unknown
}

/// Forbidden phrases found anywhere in the draft prose (case-insensitive)
pub fn scan_forbidden(draft: &Draft, phrases: &[String]) -> Vec<String> {
    let mut matches = Vec::new();

    for phrase in phrases {
        if phrase.trim().is_empty() {
            continue;
        }
        let pattern = match RegexBuilder::new(&regex::escape(phrase)).case_insensitive(true).build() {
            Ok(re) => re,
            Err(e) => {
                warn!(phrase = %phrase, error = %e, "Skipping unbuildable forbidden-phrase pattern");
                continue;
            }
        };
        if draft.sections.iter().any(|s| pattern.is_match(&s.body)) {
            matches.push(phrase.clone());
        }
    }

    matches
}

/// Manifest of every valid cited evidence ID with its source fact
///
/// Unknown IDs do not get manifest entries; they are the finalizing gate's
/// problem, reported by [`unknown_citations`].
pub fn build_manifest(draft: &Draft, diagnostic: &DiagnosticInput) -> Vec<EvidenceRef> {
    let allowed = diagnostic.evidence_set();
    let mut ids: Vec<String> = draft
        .cited_evidence()
        .into_iter()
        .filter(|id| allowed.contains(id))
        .collect();
    ids.sort();

    ids.into_iter()
        .map(|id| {
            let source = diagnostic
                .describe_evidence(&id)
                .unwrap_or_else(|| "diagnostic fact".to_string());
            EvidenceRef { id, source }
        })
        .collect()
}

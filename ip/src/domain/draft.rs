//! Draft and report types
//!
//! A draft is the structured five-section narrative produced by the
//! generator; a report is the accepted draft plus its evidence manifest and
//! the capacity-planned actions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::action::ActionPlan;

/// The five fixed report sections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    #[default]
    Summary,
    Strengths,
    Risks,
    Recommendations,
    Outlook,
}

impl SectionKind {
    /// All section kinds, in report order
    pub const ALL: [SectionKind; 5] = [
        SectionKind::Summary,
        SectionKind::Strengths,
        SectionKind::Risks,
        SectionKind::Recommendations,
        SectionKind::Outlook,
    ];

    /// Parse from the wire name, if it matches a known section
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "summary" => Some(Self::Summary),
            "strengths" => Some(Self::Strengths),
            "risks" => Some(Self::Risks),
            "recommendations" => Some(Self::Recommendations),
            "outlook" => Some(Self::Outlook),
            _ => None,
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::Strengths => write!(f, "strengths"),
            Self::Risks => write!(f, "risks"),
            Self::Recommendations => write!(f, "recommendations"),
            Self::Outlook => write!(f, "outlook"),
        }
    }
}

/// One narrative section with its evidence citations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftSection {
    pub kind: SectionKind,

    /// Narrative prose
    pub body: String,

    /// Evidence IDs cited by claims in this section
    #[serde(default)]
    pub evidence_ids: Vec<String>,
}

/// A structured five-section draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    /// Exactly one section per [`SectionKind`], in report order
    pub sections: Vec<DraftSection>,

    /// All evidence IDs the generator claims to have used
    #[serde(default)]
    pub evidence_ids_used: Vec<String>,

    /// Gaps the generator itself flagged while writing
    #[serde(default)]
    pub gaps_marked: Vec<String>,
}

impl Draft {
    /// A structurally complete draft with empty bodies
    pub fn empty() -> Self {
        Self {
            sections: SectionKind::ALL
                .iter()
                .map(|kind| DraftSection {
                    kind: *kind,
                    body: String::new(),
                    evidence_ids: Vec::new(),
                })
                .collect(),
            evidence_ids_used: Vec::new(),
            gaps_marked: Vec::new(),
        }
    }

    /// Section by kind
    pub fn section(&self, kind: SectionKind) -> Option<&DraftSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// Union of all cited evidence IDs across sections and the usage list
    pub fn cited_evidence(&self) -> HashSet<String> {
        let mut ids: HashSet<String> = self.evidence_ids_used.iter().cloned().collect();
        for section in &self.sections {
            ids.extend(section.evidence_ids.iter().cloned());
        }
        ids
    }
}

/// Overall quality rating from the critic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualityRating {
    Red,
    /// Middle value; the safe default when the critic response is malformed
    #[default]
    Yellow,
    Green,
}

impl QualityRating {
    /// Parse from the wire name, falling back to the middle value
    pub fn parse_or_default(s: &str) -> Self {
        match s {
            "red" => Self::Red,
            "yellow" => Self::Yellow,
            "green" => Self::Green,
            _ => Self::Yellow,
        }
    }
}

impl std::fmt::Display for QualityRating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Red => write!(f, "red"),
            Self::Yellow => write!(f, "yellow"),
            Self::Green => write!(f, "green"),
        }
    }
}

/// One manifest entry tying a cited evidence ID to its source fact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub id: String,

    /// Human-readable description of the underlying fact
    pub source: String,
}

/// The final persisted report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub draft: Draft,

    /// Every evidence ID cited in the accepted draft, with its source
    pub evidence_manifest: Vec<EvidenceRef>,

    /// Capacity-bounded action plan
    pub action_plan: ActionPlan,

    /// True when the final gate force-accepted after its single retry
    #[serde(default)]
    pub forced: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_draft_has_all_sections() {
        let draft = Draft::empty();
        assert_eq!(draft.sections.len(), 5);
        for kind in SectionKind::ALL {
            assert!(draft.section(kind).is_some());
        }
    }

    #[test]
    fn test_cited_evidence_union() {
        let mut draft = Draft::empty();
        draft.evidence_ids_used = vec!["obj-a".to_string()];
        draft.sections[0].evidence_ids = vec!["obj-b".to_string(), "obj-a".to_string()];

        let cited = draft.cited_evidence();
        assert_eq!(cited.len(), 2);
        assert!(cited.contains("obj-a"));
        assert!(cited.contains("obj-b"));
    }

    #[test]
    fn test_section_kind_parse_round_trip() {
        for kind in SectionKind::ALL {
            assert_eq!(SectionKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(SectionKind::parse("appendix"), None);
    }

    #[test]
    fn test_quality_rating_defaults_to_yellow() {
        assert_eq!(QualityRating::parse_or_default("green"), QualityRating::Green);
        assert_eq!(QualityRating::parse_or_default("purple"), QualityRating::Yellow);
        assert_eq!(QualityRating::default(), QualityRating::Yellow);
    }

    #[test]
    fn test_quality_rating_serde() {
        let json = serde_json::to_string(&QualityRating::Red).unwrap();
        assert_eq!(json, "\"red\"");
        let back: QualityRating = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(back, QualityRating::Green);
    }
}

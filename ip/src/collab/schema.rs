//! Tolerant decoding of collaborator JSON
//!
//! Collaborator responses are loosely-typed LLM output and are never trusted
//! past this boundary. Decoding here cannot fail: whatever fields parse are
//! kept, missing arrays become empty, bad enums fall back to safe defaults.
//! A single malformed response must not abort an otherwise-recoverable
//! session.

use serde_json::Value;
use tracing::warn;

use super::{Assessment, FinalReview};
use crate::domain::{CandidateQuestion, Draft, DraftSection, Gap, QualityRating, QuestionType, SectionKind};

/// Extract a JSON object from raw model output
///
/// Tries a direct parse first, then the outermost brace span (models love
/// wrapping JSON in markdown fences).
pub fn extract_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(text)
        && value.is_object()
    {
        return Some(value);
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok().filter(Value::is_object)
}

fn str_field(value: &Value, key: &str) -> String {
    value.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn string_array(value: &Value, key: &str) -> Vec<String> {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Decode a generator response into a structurally complete draft
///
/// Sections are matched by kind; duplicates keep the first occurrence and
/// absent kinds are padded with empty bodies, so downstream code can rely on
/// all five sections existing.
pub fn decode_draft(value: &Value) -> Draft {
    let mut draft = Draft::empty();

    if let Some(sections) = value.get("sections").and_then(Value::as_array) {
        for raw in sections {
            let kind_name = raw
                .get("kind")
                .or_else(|| raw.get("section"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let Some(kind) = SectionKind::parse(kind_name) else {
                warn!(section = kind_name, "Dropping section of unknown kind");
                continue;
            };
            let body = str_field(raw, "body");
            let evidence_ids = string_array(raw, "evidence_ids");

            if let Some(slot) = draft.sections.iter_mut().find(|s| s.kind == kind) {
                if slot.body.is_empty() {
                    *slot = DraftSection {
                        kind,
                        body,
                        evidence_ids,
                    };
                }
            }
        }
    } else {
        warn!("Generator response has no sections array; using empty draft");
    }

    draft.evidence_ids_used = string_array(value, "evidence_ids_used");
    draft.gaps_marked = string_array(value, "gaps_marked");
    draft
}

/// Decode a critic assess response
pub fn decode_assessment(value: &Value) -> Assessment {
    let gaps = value
        .get("gaps")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().enumerate().map(|(i, raw)| decode_gap(raw, i)).collect())
        .unwrap_or_default();

    let overall_quality = value
        .get("overall_quality")
        .and_then(Value::as_str)
        .map(QualityRating::parse_or_default)
        .unwrap_or_default();

    let generated_questions = value
        .get("generated_questions")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(decode_question).collect())
        .unwrap_or_default();

    Assessment {
        gaps,
        overall_quality,
        rewrite_instructions: string_array(value, "rewrite_instructions"),
        generated_questions,
    }
}

fn decode_gap(raw: &Value, index: usize) -> Gap {
    let gap_id = {
        let id = str_field(raw, "gap_id");
        if id.is_empty() { format!("gap-{}", index + 1) } else { id }
    };

    let section = raw
        .get("section")
        .and_then(Value::as_str)
        .and_then(SectionKind::parse)
        .unwrap_or_default();

    // Severity clamped into 1-5; anything unreadable lands mid-scale
    let severity = raw
        .get("severity")
        .and_then(Value::as_u64)
        .map(|s| s.clamp(1, 5) as u8)
        .unwrap_or(3);

    Gap {
        gap_id,
        section,
        description: str_field(raw, "description"),
        severity,
        related_evidence_ids: string_array(raw, "related_evidence_ids").into_iter().collect(),
    }
}

/// Decode one candidate question; questions with no text are dropped
fn decode_question(raw: &Value) -> Option<CandidateQuestion> {
    let text = str_field(raw, "text");
    if text.trim().is_empty() {
        return None;
    }

    let kind = match raw.get("type").and_then(Value::as_str) {
        Some("yes_no") => QuestionType::YesNo,
        Some("mcq") => QuestionType::Mcq,
        _ => QuestionType::FreeText,
    };

    let options = match kind {
        QuestionType::Mcq => normalize_mcq_options(string_array(raw, "options")),
        _ => Vec::new(),
    };

    Some(CandidateQuestion {
        gap_id: str_field(raw, "gap_id"),
        kind,
        text,
        options,
        rationale: str_field(raw, "rationale"),
    })
}

/// MCQ options carry 2-4 choices plus a trailing "Other"
fn normalize_mcq_options(options: Vec<String>) -> Vec<String> {
    let mut choices: Vec<String> = options
        .into_iter()
        .filter(|o| !o.trim().is_empty() && !o.trim().eq_ignore_ascii_case("other"))
        .collect();
    choices.truncate(4);
    if choices.len() < 2 {
        choices.push("None of these".to_string());
    }
    if choices.len() < 2 {
        choices.insert(0, "Yes, this applies".to_string());
    }
    choices.push("Other".to_string());
    choices
}

/// Decode the critic's final verdict
///
/// `ready` defaults to false; the orchestrator only loops back on a hard
/// violation, so a malformed verdict cannot spin the gate.
pub fn decode_final_review(value: &Value) -> FinalReview {
    FinalReview {
        ready: value.get("ready").and_then(Value::as_bool).unwrap_or(false),
        edits: string_array(value, "edits"),
        forbidden_matches: string_array(value, "forbidden_matches"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_json_direct() {
        let value = extract_json("{\"ready\": true}").unwrap();
        assert_eq!(value["ready"], true);
    }

    #[test]
    fn test_extract_json_from_fenced_output() {
        let text = "Here is the review:\n```json\n{\"ready\": false, \"edits\": []}\n```\nDone.";
        let value = extract_json(text).unwrap();
        assert_eq!(value["ready"], false);
    }

    #[test]
    fn test_extract_json_garbage() {
        assert!(extract_json("no json here at all").is_none());
        assert!(extract_json("}{").is_none());
        assert!(extract_json("[1, 2, 3]").is_none());
    }

    #[test]
    fn test_decode_draft_pads_missing_sections() {
        let value = json!({
            "sections": [
                {"kind": "summary", "body": "Overall solid.", "evidence_ids": ["obj-a"]}
            ],
            "evidence_ids_used": ["obj-a"]
        });

        let draft = decode_draft(&value);
        assert_eq!(draft.sections.len(), 5);
        assert_eq!(draft.section(SectionKind::Summary).unwrap().body, "Overall solid.");
        assert_eq!(draft.section(SectionKind::Risks).unwrap().body, "");
        assert_eq!(draft.evidence_ids_used, vec!["obj-a"]);
    }

    #[test]
    fn test_decode_draft_accepts_section_alias_and_drops_unknown() {
        let value = json!({
            "sections": [
                {"section": "risks", "body": "Two risks.", "evidence_ids": []},
                {"kind": "appendix", "body": "dropped"}
            ]
        });

        let draft = decode_draft(&value);
        assert_eq!(draft.section(SectionKind::Risks).unwrap().body, "Two risks.");
    }

    #[test]
    fn test_decode_draft_keeps_first_duplicate() {
        let value = json!({
            "sections": [
                {"kind": "summary", "body": "first"},
                {"kind": "summary", "body": "second"}
            ]
        });

        let draft = decode_draft(&value);
        assert_eq!(draft.section(SectionKind::Summary).unwrap().body, "first");
    }

    #[test]
    fn test_decode_draft_from_null() {
        let draft = decode_draft(&Value::Null);
        assert_eq!(draft.sections.len(), 5);
        assert!(draft.evidence_ids_used.is_empty());
    }

    #[test]
    fn test_decode_assessment_full() {
        let value = json!({
            "gaps": [
                {"gap_id": "gap-owner", "section": "risks", "description": "No owner named",
                 "severity": 9, "related_evidence_ids": ["cf-gov.roles"]}
            ],
            "overall_quality": "red",
            "rewrite_instructions": ["name the owner"],
            "generated_questions": [
                {"gap_id": "gap-owner", "type": "yes_no", "text": "Is there a data owner?",
                 "rationale": "grounds the risk section"}
            ]
        });

        let assessment = decode_assessment(&value);
        assert_eq!(assessment.gaps.len(), 1);
        // Severity clamped into range
        assert_eq!(assessment.gaps[0].severity, 5);
        assert_eq!(assessment.overall_quality, QualityRating::Red);
        assert_eq!(assessment.generated_questions.len(), 1);
        assert_eq!(assessment.generated_questions[0].kind, QuestionType::YesNo);
    }

    #[test]
    fn test_decode_assessment_malformed_falls_back() {
        let assessment = decode_assessment(&json!({"overall_quality": "sparkling"}));
        assert!(assessment.gaps.is_empty());
        assert_eq!(assessment.overall_quality, QualityRating::Yellow);
        assert!(assessment.generated_questions.is_empty());
    }

    #[test]
    fn test_decode_assessment_generates_gap_ids() {
        let value = json!({
            "gaps": [{"description": "unnamed gap", "severity": 2}]
        });
        let assessment = decode_assessment(&value);
        assert_eq!(assessment.gaps[0].gap_id, "gap-1");
        assert_eq!(assessment.gaps[0].severity, 2);
    }

    #[test]
    fn test_decode_question_drops_empty_text() {
        let value = json!({
            "generated_questions": [
                {"gap_id": "g", "type": "free_text", "text": "  "},
                {"gap_id": "g", "type": "unknown-kind", "text": "Real question?"}
            ]
        });
        let assessment = decode_assessment(&value);
        assert_eq!(assessment.generated_questions.len(), 1);
        // Unknown type defaults to free text
        assert_eq!(assessment.generated_questions[0].kind, QuestionType::FreeText);
    }

    #[test]
    fn test_normalize_mcq_options() {
        // Over-long lists truncate to 4 + Other
        let options = normalize_mcq_options(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
            "e".to_string(),
        ]);
        assert_eq!(options.len(), 5);
        assert_eq!(options.last().map(String::as_str), Some("Other"));

        // A stray "Other" in the model output is not doubled
        let options = normalize_mcq_options(vec!["a".to_string(), "Other".to_string(), "b".to_string()]);
        assert_eq!(options, vec!["a", "b", "Other"]);

        // Degenerate lists are padded up to two choices
        let options = normalize_mcq_options(vec![]);
        assert!(options.len() >= 3);
        assert_eq!(options.last().map(String::as_str), Some("Other"));
    }

    #[test]
    fn test_decode_final_review() {
        let review = decode_final_review(&json!({
            "ready": true,
            "edits": [],
            "forbidden_matches": ["as an ai"]
        }));
        assert!(review.ready);
        assert_eq!(review.forbidden_matches, vec!["as an ai"]);

        let fallback = decode_final_review(&json!("not an object"));
        assert!(!fallback.ready);
        assert!(fallback.edits.is_empty());
    }
}

//! Prompt rendering
//!
//! Embedded handlebars templates plus the serializable contexts they render
//! with. The diagnostic summary is rendered to plain text here so prompt
//! formatting stays out of the collaborator clients.

pub mod embedded;

use eyre::{Context as _, Result};
use handlebars::Handlebars;
use serde::Serialize;

use crate::domain::{Answer, DiagnosticInput, Question};

/// One answered question, ready for prompt context
#[derive(Debug, Clone, Serialize)]
pub struct AnswerLine {
    pub question: String,
    pub answer: String,
    pub low_confidence: bool,
}

impl AnswerLine {
    /// Pair persisted questions with their answers, in question order
    pub fn collect(questions: &[Question], answers: &[Answer]) -> Vec<AnswerLine> {
        questions
            .iter()
            .filter_map(|q| {
                answers.iter().find(|a| a.question_id == q.id).map(|a| AnswerLine {
                    question: q.text.clone(),
                    answer: a.value.as_prompt_text(),
                    low_confidence: a.confidence == crate::domain::AnswerConfidence::Low,
                })
            })
            .collect()
    }
}

/// Context for the generator user prompt
#[derive(Debug, Clone, Serialize)]
pub struct GeneratorContext {
    pub diagnostic: String,
    pub evidence_ids: Vec<String>,
    pub answers: Vec<AnswerLine>,
    pub rewrite_instructions: Vec<String>,
}

/// Context for the critic assess prompt
#[derive(Debug, Clone, Serialize)]
pub struct AssessContext {
    pub diagnostic: String,
    pub draft: String,
}

/// Context for the final gate prompt
#[derive(Debug, Clone, Serialize)]
pub struct FinalContext {
    pub draft: String,
    pub forbidden_phrases: String,
}

/// Render a template with the given context
pub fn render<T: Serialize>(template: &str, context: &T) -> Result<String> {
    let mut handlebars = Handlebars::new();
    // Prompts are plain text, not HTML; escaping would mangle quotes
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
        .render_template(template, context)
        .context("Failed to render prompt template")
}

/// Plain-text rendering of the diagnostic for prompt context
pub fn describe_diagnostic(input: &DiagnosticInput) -> String {
    let mut out = String::new();

    out.push_str("Objectives:\n");
    for obj in &input.objectives {
        out.push_str(&format!(
            "- [obj-{}] {}: score {}/100 (weight {}){}\n",
            obj.id,
            obj.name,
            obj.score,
            obj.importance,
            if obj.has_critical_failure { ", CRITICAL FAILURE" } else { "" }
        ));
    }

    if !input.critical_failures.is_empty() {
        out.push_str("\nCritical failures:\n");
        for cf in &input.critical_failures {
            out.push_str(&format!("- [cf-{}] {}\n", cf.objective_id, cf.description));
        }
    }

    if !input.failed_gates.is_empty() {
        out.push_str("\nFailed gates:\n");
        for gate in &input.failed_gates {
            out.push_str(&format!(
                "- [gate-{}] level {} blocked: {}\n",
                gate.gate_id, gate.level, gate.description
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AnswerConfidence, AnswerValue, CandidateQuestion, CriticalFailure, Objective, QuestionType,
    };

    fn diagnostic() -> DiagnosticInput {
        DiagnosticInput {
            objectives: vec![Objective {
                id: "gov.roles".to_string(),
                name: "Governance roles".to_string(),
                score: 35,
                importance: 3,
                has_critical_failure: true,
                question_id: None,
                expert_action: None,
            }],
            critical_failures: vec![CriticalFailure {
                objective_id: "gov.roles".to_string(),
                description: "No designated data owner".to_string(),
            }],
            failed_gates: vec![],
        }
    }

    #[test]
    fn test_describe_diagnostic() {
        let text = describe_diagnostic(&diagnostic());
        assert!(text.contains("[obj-gov.roles]"));
        assert!(text.contains("score 35/100"));
        assert!(text.contains("CRITICAL FAILURE"));
        assert!(text.contains("[cf-gov.roles]"));
        assert!(!text.contains("Failed gates"));
    }

    #[test]
    fn test_render_generator_prompt() {
        let context = GeneratorContext {
            diagnostic: describe_diagnostic(&diagnostic()),
            evidence_ids: vec!["obj-gov.roles".to_string(), "cf-gov.roles".to_string()],
            answers: vec![AnswerLine {
                question: "Is there a data owner?".to_string(),
                answer: "no".to_string(),
                low_confidence: true,
            }],
            rewrite_instructions: vec![],
        };

        let rendered = render(embedded::GENERATOR_USER, &context).unwrap();
        assert!(rendered.contains("- obj-gov.roles"));
        assert!(rendered.contains("Q: Is there a data owner?"));
        assert!(rendered.contains("answered quickly"));
        assert!(!rendered.contains("Rewrite instructions"));
    }

    #[test]
    fn test_render_omits_empty_answers_block() {
        let context = GeneratorContext {
            diagnostic: "x".to_string(),
            evidence_ids: vec![],
            answers: vec![],
            rewrite_instructions: vec!["tighten the summary".to_string()],
        };

        let rendered = render(embedded::GENERATOR_USER, &context).unwrap();
        assert!(!rendered.contains("Clarifying answers"));
        assert!(rendered.contains("tighten the summary"));
    }

    #[test]
    fn test_answer_line_collect_pairs_in_question_order() {
        let q1 = Question::from_candidate(
            CandidateQuestion {
                gap_id: "gap-1".to_string(),
                kind: QuestionType::YesNo,
                text: "First?".to_string(),
                options: vec![],
                rationale: String::new(),
            },
            "sess-1",
            1,
        );
        let q2 = Question::from_candidate(
            CandidateQuestion {
                gap_id: "gap-2".to_string(),
                kind: QuestionType::FreeText,
                text: "Second?".to_string(),
                options: vec![],
                rationale: String::new(),
            },
            "sess-1",
            1,
        );

        // Answers arrive out of order; unanswered questions are skipped
        let answers = vec![Answer::new(
            &q2.id,
            "sess-1",
            AnswerValue::Text("weekly".to_string()),
            AnswerConfidence::Normal,
        )];

        let lines = AnswerLine::collect(&[q1, q2], &answers);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].question, "Second?");
        assert_eq!(lines[0].answer, "weekly");
    }
}

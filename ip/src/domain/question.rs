//! Gap, Question, and Answer types
//!
//! Gaps live only for the round that produced them; a gap that makes the
//! budget cut seeds a persisted Question. Answers are append-only.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use sessionstore::{IndexValue, Record, now_ms};

use super::draft::SectionKind;
use super::id::generate_id;

/// A critic-identified deficiency in a draft
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gap {
    pub gap_id: String,

    /// Report section the gap affects
    pub section: SectionKind,

    pub description: String,

    /// 1-5, higher is more important (clamped at the schema boundary)
    pub severity: u8,

    /// Evidence the gap relates to; a gap fully covered by evidence already
    /// in the draft signals redundancy rather than missing information
    #[serde(default)]
    pub related_evidence_ids: BTreeSet<String>,
}

/// How a clarifying question is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    YesNo,
    Mcq,
    #[default]
    FreeText,
}

impl std::fmt::Display for QuestionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::YesNo => write!(f, "yes_no"),
            Self::Mcq => write!(f, "mcq"),
            Self::FreeText => write!(f, "free_text"),
        }
    }
}

/// A critic-proposed question that has not yet made the budget cut
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateQuestion {
    /// Gap this question would close
    pub gap_id: String,

    #[serde(rename = "type")]
    pub kind: QuestionType,

    pub text: String,

    /// Mcq only: 2-4 choices plus a trailing "Other"
    #[serde(default)]
    pub options: Vec<String>,

    /// Why the answer matters for the report
    #[serde(default)]
    pub rationale: String,
}

/// A clarifying question asked of the end user
///
/// Immutable once persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,

    /// Owning session
    pub session_id: String,

    /// Gap that seeded this question
    pub gap_id: String,

    /// Round the question was asked in (1-indexed)
    pub round: u32,

    #[serde(rename = "type")]
    pub kind: QuestionType,

    pub text: String,

    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub rationale: String,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Question {
    /// Persist-ready question from a budgeted candidate
    pub fn from_candidate(candidate: CandidateQuestion, session_id: &str, round: u32) -> Self {
        let now = now_ms();
        Self {
            id: generate_id("question", &candidate.text),
            session_id: session_id.to_string(),
            gap_id: candidate.gap_id,
            round,
            kind: candidate.kind,
            text: candidate.text,
            options: candidate.options,
            rationale: candidate.rationale,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Question {
    fn id(&self) -> &str {
        &self.id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "questions"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("session_id".to_string(), IndexValue::String(self.session_id.clone()));
        fields.insert("round".to_string(), IndexValue::Int(self.round as i64));
        fields
    }
}

/// An answer value: boolean for yes/no, text otherwise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Flag(bool),
    Text(String),
}

impl AnswerValue {
    /// Render for prompt context
    pub fn as_prompt_text(&self) -> String {
        match self {
            AnswerValue::Flag(true) => "yes".to_string(),
            AnswerValue::Flag(false) => "no".to_string(),
            AnswerValue::Text(s) => s.clone(),
        }
    }
}

/// Confidence attached by the intake side
///
/// `Low` marks an answer given unusually fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswerConfidence {
    #[default]
    Normal,
    Low,
}

/// A user answer to one question
///
/// Keyed by its question ID: one answer per question, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: String,

    pub session_id: String,

    pub value: AnswerValue,

    #[serde(default)]
    pub confidence: AnswerConfidence,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Answer {
    pub fn new(question_id: &str, session_id: &str, value: AnswerValue, confidence: AnswerConfidence) -> Self {
        let now = now_ms();
        Self {
            question_id: question_id.to_string(),
            session_id: session_id.to_string(),
            value,
            confidence,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Record for Answer {
    fn id(&self) -> &str {
        &self.question_id
    }

    fn updated_at(&self) -> i64 {
        self.updated_at
    }

    fn collection_name() -> &'static str {
        "answers"
    }

    fn indexed_fields(&self) -> HashMap<String, IndexValue> {
        let mut fields = HashMap::new();
        fields.insert("session_id".to_string(), IndexValue::String(self.session_id.clone()));
        fields
    }
}

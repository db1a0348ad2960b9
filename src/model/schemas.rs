//! Per-call-site structured-output contracts.
//!
//! Every generation call in the system pairs a response schema (sent to the
//! provider) with a typed payload (decoded from the response). Decoding uses
//! `deny_unknown_fields`, so the field set is closed; [`SchemaPayload::check`]
//! adds the value-range constraints a JSON shape alone cannot express.
//! A payload that fails either step counts as a schema violation and the
//! gateway re-asks with a reformat instruction.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::{Category, QuestionDifficulty};

/// Typed response payload with first-class validation.
pub trait SchemaPayload: DeserializeOwned {
    /// Schema sent to the provider for this call site.
    fn schema() -> Value;

    /// Value-level constraints beyond the JSON shape. Violations are treated
    /// like any other schema failure.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// OCR page-batch extraction
// ---------------------------------------------------------------------------

/// One categorized verbatim fragment extracted from a page batch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ExtractedChunk {
    pub category: Category,
    pub chunk_text: String,
}

/// Result of one OCR batch over `INGEST_BATCH_PAGES` page images.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PageExtraction {
    pub chunks: Vec<ExtractedChunk>,
}

impl SchemaPayload for PageExtraction {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "chunks": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "category": {
                                "type": "STRING",
                                "enum": Category::ALL.iter().map(|c| c.as_str()).collect::<Vec<_>>(),
                            },
                            "chunk_text": { "type": "STRING" }
                        },
                        "required": ["category", "chunk_text"]
                    }
                }
            },
            "required": ["chunks"]
        })
    }

    fn check(&self) -> Result<(), String> {
        if self.chunks.iter().any(|c| c.chunk_text.trim().is_empty()) {
            return Err("extraction produced an empty chunk_text".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-category question generation
// ---------------------------------------------------------------------------

/// One generated interview question with its teaching aids.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GeneratedQuestion {
    pub body: String,
    pub difficulty: QuestionDifficulty,
    #[serde(default)]
    pub model_answer: Option<String>,
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Batch of questions for a single category.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct QuestionBatch {
    pub questions: Vec<GeneratedQuestion>,
}

/// Hard ceiling on generated questions per category per set.
pub const MAX_QUESTIONS_PER_CATEGORY: usize = 5;

/// Declared length bound on a question body, in characters.
pub const MAX_QUESTION_CHARS: usize = 500;

impl SchemaPayload for QuestionBatch {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "questions": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "body": { "type": "STRING" },
                            "difficulty": { "type": "STRING", "enum": ["BASIC", "DEEP"] },
                            "model_answer": { "type": "STRING" },
                            "purpose": { "type": "STRING" }
                        },
                        "required": ["body", "difficulty"]
                    }
                }
            },
            "required": ["questions"]
        })
    }

    fn check(&self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err("question batch was empty".into());
        }
        if self.questions.iter().any(|q| q.body.trim().is_empty()) {
            return Err("question batch contained an empty body".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Answer analysis
// ---------------------------------------------------------------------------

/// Scored analysis of one candidate answer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AnswerAnalysis {
    /// Overall score for the answer, 0..=100.
    pub score: u32,
    /// Short feedback in the interviewer's voice.
    pub feedback: String,
    #[serde(default)]
    pub strength_tags: Vec<String>,
    #[serde(default)]
    pub weakness_tags: Vec<String>,
}

impl SchemaPayload for AnswerAnalysis {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "score": { "type": "INTEGER", "minimum": 0, "maximum": 100 },
                "feedback": { "type": "STRING" },
                "strength_tags": { "type": "ARRAY", "items": { "type": "STRING" } },
                "weakness_tags": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["score", "feedback"]
        })
    }

    fn check(&self) -> Result<(), String> {
        if self.score > 100 {
            return Err(format!("score {} exceeds 100", self.score));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Follow-up / new-topic question generation
// ---------------------------------------------------------------------------

/// Single-question payload shared by the follow-up and new-topic generators.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NextQuestion {
    pub question: String,
}

impl SchemaPayload for NextQuestion {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": { "question": { "type": "STRING" } },
            "required": ["question"]
        })
    }

    fn check(&self) -> Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("generated question was empty".into());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Wrap-up report
// ---------------------------------------------------------------------------

/// Axis scores of the final report. Each axis is 0..=25; the total 0..=100.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReportScores {
    #[serde(rename = "전공적합성")]
    pub major_fit: u32,
    #[serde(rename = "인성")]
    pub character: u32,
    #[serde(rename = "발전가능성")]
    pub growth: u32,
    #[serde(rename = "의사소통능력")]
    pub communication: u32,
    #[serde(rename = "총점")]
    pub total: u32,
}

/// Per-answer breakdown in the final report.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AnswerReview {
    pub question: String,
    pub response_time: u32,
    pub evaluation: String,
    pub improvement_point: String,
    pub supplement_needed: String,
}

/// Comprehensive post-interview report.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WrapUpReport {
    pub scores: ReportScores,
    #[serde(default)]
    pub strength_tags: Vec<String>,
    #[serde(default)]
    pub weakness_tags: Vec<String>,
    #[serde(default)]
    pub detailed_analysis: Vec<AnswerReview>,
}

impl SchemaPayload for WrapUpReport {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "scores": {
                    "type": "OBJECT",
                    "properties": {
                        "전공적합성": { "type": "INTEGER", "minimum": 0, "maximum": 25 },
                        "인성": { "type": "INTEGER", "minimum": 0, "maximum": 25 },
                        "발전가능성": { "type": "INTEGER", "minimum": 0, "maximum": 25 },
                        "의사소통능력": { "type": "INTEGER", "minimum": 0, "maximum": 25 },
                        "총점": { "type": "INTEGER", "minimum": 0, "maximum": 100 }
                    },
                    "required": ["전공적합성", "인성", "발전가능성", "의사소통능력", "총점"]
                },
                "strength_tags": { "type": "ARRAY", "items": { "type": "STRING" } },
                "weakness_tags": { "type": "ARRAY", "items": { "type": "STRING" } },
                "detailed_analysis": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "question": { "type": "STRING" },
                            "response_time": { "type": "INTEGER" },
                            "evaluation": { "type": "STRING" },
                            "improvement_point": { "type": "STRING" },
                            "supplement_needed": { "type": "STRING" }
                        },
                        "required": [
                            "question",
                            "response_time",
                            "evaluation",
                            "improvement_point",
                            "supplement_needed"
                        ]
                    }
                }
            },
            "required": ["scores", "strength_tags", "weakness_tags", "detailed_analysis"]
        })
    }

    fn check(&self) -> Result<(), String> {
        let axes = [
            self.scores.major_fit,
            self.scores.character,
            self.scores.growth,
            self.scores.communication,
        ];
        if axes.iter().any(|score| *score > 25) {
            return Err("axis score exceeds 25".into());
        }
        if self.scores.total > 100 {
            return Err("total score exceeds 100".into());
        }
        Ok(())
    }
}

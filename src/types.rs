//! Core domain types shared across the subsystems.
//!
//! These enums pin down the closed label sets used throughout the data
//! model. They serialize to the exact strings stored in the database and
//! exchanged with the model, so the serde representations are part of the
//! persistence contract.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a life record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "PROCESSING")]
    Processing,
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "FAILED")]
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "PENDING",
            RecordStatus::Processing => "PROCESSING",
            RecordStatus::Ready => "READY",
            RecordStatus::Failed => "FAILED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PENDING" => Some(RecordStatus::Pending),
            "PROCESSING" => Some(RecordStatus::Processing),
            "READY" => Some(RecordStatus::Ready),
            "FAILED" => Some(RecordStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Section category of a life-record chunk.
///
/// The categorizer assigns each extracted chunk to one of these fixed
/// sections of the Korean school life record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// 성적 — academic grades.
    #[serde(rename = "성적")]
    Grades,
    /// 세특 — per-subject detail notes.
    #[serde(rename = "세특")]
    SubjectDetail,
    /// 창체 — creative/experiential activities.
    #[serde(rename = "창체")]
    CreativeActivity,
    /// 행특 — behavioral characteristics.
    #[serde(rename = "행특")]
    Behavior,
    /// 출결 — attendance.
    #[serde(rename = "출결")]
    Attendance,
    /// 독서 — reading activities.
    #[serde(rename = "독서")]
    Reading,
    /// 수상 — awards.
    #[serde(rename = "수상")]
    Awards,
    /// 진로 — career activities.
    #[serde(rename = "진로")]
    Career,
    /// 기타 — everything else.
    #[serde(rename = "기타")]
    Other,
}

impl Category {
    /// Every category, in declaration order. Fan-out merges and reports use
    /// this order to stay deterministic.
    pub const ALL: [Category; 9] = [
        Category::Grades,
        Category::SubjectDetail,
        Category::CreativeActivity,
        Category::Behavior,
        Category::Attendance,
        Category::Reading,
        Category::Awards,
        Category::Career,
        Category::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Grades => "성적",
            Category::SubjectDetail => "세특",
            Category::CreativeActivity => "창체",
            Category::Behavior => "행특",
            Category::Attendance => "출결",
            Category::Reading => "독서",
            Category::Awards => "수상",
            Category::Career => "진로",
            Category::Other => "기타",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Category::ALL.iter().copied().find(|c| c.as_str() == raw)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interview difficulty selected by the student.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Easy" => Some(Difficulty::Easy),
            "Normal" => Some(Difficulty::Normal),
            "Hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Difficulty tier of a generated question.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionDifficulty {
    #[serde(rename = "BASIC")]
    Basic,
    #[serde(rename = "DEEP")]
    Deep,
}

impl QuestionDifficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionDifficulty::Basic => "BASIC",
            QuestionDifficulty::Deep => "DEEP",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "BASIC" => Some(QuestionDifficulty::Basic),
            "DEEP" => Some(QuestionDifficulty::Deep),
            _ => None,
        }
    }
}

/// Lifecycle status of an interview session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "ABANDONED")]
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "IN_PROGRESS",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Abandoned => "ABANDONED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "IN_PROGRESS" => Some(SessionStatus::InProgress),
            "COMPLETED" => Some(SessionStatus::Completed),
            "ABANDONED" => Some(SessionStatus::Abandoned),
            _ => None,
        }
    }
}

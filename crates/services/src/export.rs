//! JSON document written by the `export-quiz` command.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quiz_core::model::{QuestionId, QuestionKind, QuizId, QuizKind};

/// A quiz with its questions and answers inlined. Categories are referenced by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizExport {
    pub id: QuizId,
    pub title: String,
    pub description: String,
    pub kind: QuizKind,
    pub url: String,
    pub category: Option<String>,
    pub random_order: bool,
    pub max_questions: Option<u32>,
    pub exam_paper: bool,
    pub single_attempt: bool,
    pub pass_mark: u8,
    pub success_text: String,
    pub fail_text: String,
    pub draft: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub questions: Vec<QuestionExport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionExport {
    pub id: QuestionId,
    pub content: String,
    pub explanation: String,
    pub figure: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

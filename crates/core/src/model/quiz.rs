use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{CategoryId, QuizId};

const MAX_TITLE_LEN: usize = 60;
const MAX_SLUG_LEN: usize = 60;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz title cannot be empty")]
    EmptyTitle,

    #[error("quiz title is longer than {MAX_TITLE_LEN} characters")]
    TitleTooLong,

    #[error("quiz url cannot be empty")]
    EmptySlug,

    #[error("quiz url is longer than {MAX_SLUG_LEN} characters")]
    SlugTooLong,

    #[error("{0} is above 100")]
    PassMarkAbove100(u16),

    #[error("a \"topic\" quiz should have a category")]
    TopicWithoutCategory,

    #[error("unknown quiz type: {0}")]
    UnknownKind(String),
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuizKind {
    #[default]
    General,
    Topic,
    Monthly,
}

impl QuizKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuizKind::General => "general",
            QuizKind::Topic => "topic",
            QuizKind::Monthly => "monthly",
        }
    }

    /// # Errors
    ///
    /// Returns `QuizError::UnknownKind` for anything but `general|topic|monthly`.
    pub fn parse(value: &str) -> Result<Self, QuizError> {
        match value {
            "general" => Ok(Self::General),
            "topic" => Ok(Self::Topic),
            "monthly" => Ok(Self::Monthly),
            other => Err(QuizError::UnknownKind(other.to_string())),
        }
    }
}

//
// ─── SLUG ──────────────────────────────────────────────────────────────────────
//

/// User friendly url fragment for a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizSlug(String);

impl QuizSlug {
    /// Whitespace runs become `-`, the result is lowercased and anything that
    /// is neither alphanumeric nor `-` is dropped.
    ///
    /// # Errors
    ///
    /// Returns `QuizError::EmptySlug` or `QuizError::SlugTooLong`.
    pub fn normalize(raw: &str) -> Result<Self, QuizError> {
        let slug: String = raw
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-')
            .collect();

        if slug.is_empty() {
            return Err(QuizError::EmptySlug);
        }
        if slug.chars().count() > MAX_SLUG_LEN {
            return Err(QuizError::SlugTooLong);
        }
        Ok(Self(slug))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QuizSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated quiz input, as submitted by an editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuizDraft {
    pub title: String,
    pub description: String,
    pub kind: QuizKind,
    pub url: String,
    pub category_id: Option<CategoryId>,
    pub random_order: bool,
    pub max_questions: Option<u32>,
    pub exam_paper: bool,
    pub single_attempt: bool,
    pub pass_mark: u16,
    pub success_text: String,
    pub fail_text: String,
    pub draft: bool,
}

impl QuizDraft {
    /// Validate and normalize the draft.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` when title, url, pass mark or topic category rules fail.
    pub fn validate(self) -> Result<QuizDetails, QuizError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(QuizError::EmptyTitle);
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(QuizError::TitleTooLong);
        }

        let slug = QuizSlug::normalize(&self.url)?;

        if self.pass_mark > 100 {
            return Err(QuizError::PassMarkAbove100(self.pass_mark));
        }
        let pass_mark = u8::try_from(self.pass_mark)
            .map_err(|_| QuizError::PassMarkAbove100(self.pass_mark))?;

        if self.kind == QuizKind::Topic && self.category_id.is_none() {
            return Err(QuizError::TopicWithoutCategory);
        }

        // A single attempt quiz always keeps its results.
        let exam_paper = self.exam_paper || self.single_attempt;

        Ok(QuizDetails {
            title,
            description: self.description,
            kind: self.kind,
            slug,
            category_id: self.category_id,
            random_order: self.random_order,
            max_questions: self.max_questions.filter(|max| *max > 0),
            exam_paper,
            single_attempt: self.single_attempt,
            pass_mark,
            success_text: self.success_text,
            fail_text: self.fail_text,
            draft: self.draft,
        })
    }
}

/// Validated quiz attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDetails {
    pub title: String,
    pub description: String,
    pub kind: QuizKind,
    pub slug: QuizSlug,
    pub category_id: Option<CategoryId>,
    pub random_order: bool,
    pub max_questions: Option<u32>,
    pub exam_paper: bool,
    pub single_attempt: bool,
    pub pass_mark: u8,
    pub success_text: String,
    pub fail_text: String,
    pub draft: bool,
}

impl QuizDetails {
    /// Turn validated details back into an editable draft.
    #[must_use]
    pub fn to_draft(&self) -> QuizDraft {
        QuizDraft {
            title: self.title.clone(),
            description: self.description.clone(),
            kind: self.kind,
            url: self.slug.as_str().to_string(),
            category_id: self.category_id,
            random_order: self.random_order,
            max_questions: self.max_questions,
            exam_paper: self.exam_paper,
            single_attempt: self.single_attempt,
            pass_mark: u16::from(self.pass_mark),
            success_text: self.success_text.clone(),
            fail_text: self.fail_text.clone(),
            draft: self.draft,
        }
    }
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    id: QuizId,
    details: QuizDetails,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Quiz {
    #[must_use]
    pub fn new(id: QuizId, details: QuizDetails, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            details,
            created_at,
            updated_at: created_at,
        }
    }

    /// Rehydrate a quiz from persisted storage, re-running validation.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the stored values no longer validate.
    pub fn from_persisted(
        id: QuizId,
        draft: QuizDraft,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, QuizError> {
        Ok(Self {
            id,
            details: draft.validate()?,
            created_at,
            updated_at,
        })
    }

    /// Replace the editable attributes, bumping `updated_at`.
    pub fn apply(&mut self, details: QuizDetails, now: DateTime<Utc>) {
        self.details = details;
        self.updated_at = now;
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn details(&self) -> &QuizDetails {
        &self.details
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.details.title
    }

    #[must_use]
    pub fn slug(&self) -> &QuizSlug {
        &self.details.slug
    }

    #[must_use]
    pub fn category_id(&self) -> Option<CategoryId> {
        self.details.category_id
    }

    #[must_use]
    pub fn is_draft(&self) -> bool {
        self.details.draft
    }

    #[must_use]
    pub fn exam_paper(&self) -> bool {
        self.details.exam_paper
    }

    #[must_use]
    pub fn single_attempt(&self) -> bool {
        self.details.single_attempt
    }

    #[must_use]
    pub fn random_order(&self) -> bool {
        self.details.random_order
    }

    #[must_use]
    pub fn max_questions(&self) -> Option<u32> {
        self.details.max_questions
    }

    #[must_use]
    pub fn pass_mark(&self) -> u8 {
        self.details.pass_mark
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Drafts are hidden from everybody who cannot edit quizzes.
    #[must_use]
    pub fn is_visible_to(&self, can_edit_quizzes: bool) -> bool {
        !self.details.draft || can_edit_quizzes
    }

    #[must_use]
    pub fn result_message(&self, passed: bool) -> &str {
        if passed {
            &self.details.success_text
        } else {
            &self.details.fail_text
        }
    }
}

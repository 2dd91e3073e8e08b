use std::collections::HashMap;
use std::sync::Arc;

use quiz_core::model::{
    CategoryId, CategoryName, QuestionId, Quiz, QuizDraft, QuizId, QuizSlug, SubCategoryId, User,
};
use storage::repository::{
    CategoryRepository, NewQuizRecord, QuestionRepository, QuizFilter, QuizRepository,
    StorageError,
};

use crate::Clock;
use crate::error::QuizServiceError;
use crate::export::{QuestionExport, QuizExport};

/// Quiz authoring, listing and export.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
    questions: Arc<dyn QuestionRepository>,
    categories: Arc<dyn CategoryRepository>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        quizzes: Arc<dyn QuizRepository>,
        questions: Arc<dyn QuestionRepository>,
        categories: Arc<dyn CategoryRepository>,
    ) -> Self {
        Self {
            clock,
            quizzes,
            questions,
            categories,
        }
    }

    /// Validate and persist a new quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Quiz` for validation failures.
    /// Returns `QuizServiceError::DuplicateSlug` when the url is already used.
    /// Returns `QuizServiceError::Storage` (`NotFound`) for an unknown category.
    pub async fn create_quiz(&self, draft: QuizDraft) -> Result<Quiz, QuizServiceError> {
        let details = draft.validate()?;
        if let Some(category) = details.category_id {
            self.categories.get_category(category).await?;
        }
        let slug = details.slug.to_string();
        let id = self
            .quizzes
            .insert_quiz(NewQuizRecord {
                details,
                created_at: self.clock.now(),
            })
            .await
            .map_err(|e| slug_conflict(e, &slug))?;
        tracing::info!(quiz_id = %id, slug = %slug, "quiz created");
        Ok(self.quizzes.get_quiz(id).await?)
    }

    /// Replace every editable attribute of a quiz.
    ///
    /// # Errors
    ///
    /// Same as [`QuizService::create_quiz`], plus `NotFound` for an unknown quiz.
    pub async fn update_quiz(&self, id: QuizId, draft: QuizDraft) -> Result<Quiz, QuizServiceError> {
        let mut quiz = self.quizzes.get_quiz(id).await?;
        let details = draft.validate()?;
        if let Some(category) = details.category_id {
            self.categories.get_category(category).await?;
        }
        let slug = details.slug.to_string();
        quiz.apply(details, self.clock.now());
        self.quizzes
            .update_quiz(&quiz)
            .await
            .map_err(|e| slug_conflict(e, &slug))?;
        Ok(quiz)
    }

    /// Published quizzes ordered by title.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if repository access fails.
    pub async fn list_quizzes(&self) -> Result<Vec<Quiz>, QuizServiceError> {
        Ok(self.quizzes.list_quizzes(&QuizFilter::published()).await?)
    }

    /// Published quizzes of one category.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` (`NotFound`) for an unknown category.
    pub async fn list_by_category(&self, raw_name: &str) -> Result<Vec<Quiz>, QuizServiceError> {
        let name = CategoryName::normalize(raw_name)?;
        let category = self
            .categories
            .find_category_by_name(&name)
            .await?
            .ok_or(StorageError::NotFound)?;
        let filter = QuizFilter {
            include_drafts: false,
            category: Some(category.id()),
        };
        Ok(self.quizzes.list_quizzes(&filter).await?)
    }

    /// A quiz by url, hiding drafts from viewers who cannot edit quizzes.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::PermissionDenied` for a draft the viewer may not see.
    /// Returns `QuizServiceError::Storage` (`NotFound`) for an unknown url.
    pub async fn quiz_detail(
        &self,
        raw_slug: &str,
        viewer: Option<&User>,
    ) -> Result<Quiz, QuizServiceError> {
        let slug = QuizSlug::normalize(raw_slug).map_err(|_| StorageError::NotFound)?;
        let quiz = self
            .quizzes
            .find_quiz_by_slug(&slug)
            .await?
            .ok_or(StorageError::NotFound)?;
        let can_edit = viewer.is_some_and(|u| u.permissions().has_edit_quizzes());
        if !quiz.is_visible_to(can_edit) {
            return Err(QuizServiceError::PermissionDenied);
        }
        Ok(quiz)
    }

    /// Replace the questions that belong to a quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` (`NotFound`) for an unknown quiz or question.
    pub async fn set_questions(
        &self,
        quiz: QuizId,
        questions: &[QuestionId],
    ) -> Result<(), QuizServiceError> {
        self.quizzes.get_quiz(quiz).await?;
        self.questions.set_quiz_questions(quiz, questions).await?;
        Ok(())
    }

    /// One point per question attached to the quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` if repository access fails.
    pub async fn max_score(&self, quiz: QuizId) -> Result<usize, QuizServiceError> {
        Ok(self.questions.questions_for_quiz(quiz).await?.len())
    }

    /// Build the export document for a quiz.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Storage` (`NotFound`) for an unknown quiz.
    pub async fn export(&self, id: QuizId) -> Result<QuizExport, QuizServiceError> {
        let quiz = self.quizzes.get_quiz(id).await?;
        let questions = self.questions.questions_for_quiz(id).await?;

        let categories: HashMap<CategoryId, String> = self
            .categories
            .list_categories()
            .await?
            .into_iter()
            .map(|c| (c.id(), c.name().to_string()))
            .collect();
        let mut sub_categories: HashMap<SubCategoryId, String> = HashMap::new();
        for category in categories.keys() {
            for sub in self.categories.list_sub_categories(*category).await? {
                sub_categories.insert(sub.id(), sub.name().to_string());
            }
        }

        let questions = questions
            .into_iter()
            .map(|q| QuestionExport {
                id: q.id,
                content: q.content,
                explanation: q.explanation,
                figure: q.figure,
                category: q.category_id.and_then(|c| categories.get(&c).cloned()),
                sub_category: q
                    .sub_category_id
                    .and_then(|s| sub_categories.get(&s).cloned()),
                kind: q.kind,
            })
            .collect();

        let d = quiz.details();
        Ok(QuizExport {
            id: quiz.id(),
            title: d.title.clone(),
            description: d.description.clone(),
            kind: d.kind,
            url: d.slug.to_string(),
            category: d.category_id.and_then(|c| categories.get(&c).cloned()),
            random_order: d.random_order,
            max_questions: d.max_questions,
            exam_paper: d.exam_paper,
            single_attempt: d.single_attempt,
            pass_mark: d.pass_mark,
            success_text: d.success_text.clone(),
            fail_text: d.fail_text.clone(),
            draft: d.draft,
            created_at: quiz.created_at(),
            updated_at: quiz.updated_at(),
            questions,
        })
    }
}

fn slug_conflict(err: StorageError, slug: &str) -> QuizServiceError {
    match err {
        StorageError::Conflict => QuizServiceError::DuplicateSlug(slug.to_string()),
        other => other.into(),
    }
}

use std::sync::Arc;

use serde::Serialize;

use quiz_core::model::UserId;
use storage::repository::{CategoryRepository, ProgressRepository, QuizRepository, SittingRepository};

use crate::error::ProgressServiceError;
use crate::sittings::{SittingSummary, summarize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryProgress {
    pub category: String,
    pub correct: u32,
    pub possible: u32,
    pub percent: u32,
}

/// A user's category scores and kept exam papers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    pub categories: Vec<CategoryProgress>,
    pub exams: Vec<SittingSummary>,
}

#[derive(Clone)]
pub struct ProgressService {
    progress: Arc<dyn ProgressRepository>,
    categories: Arc<dyn CategoryRepository>,
    quizzes: Arc<dyn QuizRepository>,
    sittings: Arc<dyn SittingRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        progress: Arc<dyn ProgressRepository>,
        categories: Arc<dyn CategoryRepository>,
        quizzes: Arc<dyn QuizRepository>,
        sittings: Arc<dyn SittingRepository>,
    ) -> Self {
        Self {
            progress,
            categories,
            quizzes,
            sittings,
        }
    }

    /// Every category with the user's score (zeros when never attempted) and the
    /// completed sittings of exam paper quizzes.
    ///
    /// # Errors
    ///
    /// Returns `ProgressServiceError::Storage` if repository access fails.
    pub async fn progress(&self, user: UserId) -> Result<ProgressReport, ProgressServiceError> {
        let progress = self.progress.get_progress(user).await?;
        let categories = self.categories.list_categories().await?;
        let categories = progress
            .list_all_category_scores(categories.iter().map(|c| c.name()))
            .into_iter()
            .map(|(name, [correct, possible, percent])| CategoryProgress {
                category: name.to_string(),
                correct,
                possible,
                percent,
            })
            .collect();

        let mut completed = Vec::new();
        for sitting in self.sittings.list_user_sittings(user).await? {
            if !sitting.is_complete() {
                continue;
            }
            if self.quizzes.get_quiz(sitting.quiz_id()).await?.exam_paper() {
                completed.push(sitting);
            }
        }
        let exams = summarize::<ProgressServiceError>(self.quizzes.as_ref(), &completed).await?;

        Ok(ProgressReport { categories, exams })
    }
}

use std::sync::Arc;

use serde::Serialize;

use quiz_core::model::{AnswerMark, SittingError, SittingId, User, UserId};
use storage::repository::{
    QuestionRepository, QuizRepository, SittingFilter, SittingRepository, UserRepository,
};

use crate::error::MarkingServiceError;
use crate::sittings::{ResultQuestion, SittingSummary, result_questions, summarize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkingListItem {
    pub user_id: UserId,
    pub user: String,
    #[serde(flatten)]
    pub sitting: SittingSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkingDetail {
    pub user_id: UserId,
    pub user: String,
    pub sitting: SittingSummary,
    pub questions: Vec<ResultQuestion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ToggleOutcome {
    pub order: u32,
    pub mark: AnswerMark,
    pub score: i64,
    pub percent: u8,
}

/// Review and hand-correct completed sittings. Every call needs `can_view_sittings`.
#[derive(Clone)]
pub struct MarkingService {
    users: Arc<dyn UserRepository>,
    quizzes: Arc<dyn QuizRepository>,
    questions: Arc<dyn QuestionRepository>,
    sittings: Arc<dyn SittingRepository>,
}

impl MarkingService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        quizzes: Arc<dyn QuizRepository>,
        questions: Arc<dyn QuestionRepository>,
        sittings: Arc<dyn SittingRepository>,
    ) -> Self {
        Self {
            users,
            quizzes,
            questions,
            sittings,
        }
    }

    /// Completed sittings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `MarkingServiceError::PermissionDenied` without `can_view_sittings`.
    /// Returns `MarkingServiceError::Storage` if repository access fails.
    pub async fn list(
        &self,
        viewer: &User,
        filter: &SittingFilter,
    ) -> Result<Vec<MarkingListItem>, MarkingServiceError> {
        ensure_marker(viewer)?;
        let sittings = self.sittings.list_completed_sittings(filter).await?;
        let summaries = summarize::<MarkingServiceError>(self.quizzes.as_ref(), &sittings).await?;

        let mut out = Vec::with_capacity(sittings.len());
        for (sitting, summary) in sittings.iter().zip(summaries) {
            let user = self.users.get_user(sitting.user_id()).await?;
            out.push(MarkingListItem {
                user_id: user.id(),
                user: user.display_name().to_string(),
                sitting: summary,
            });
        }
        Ok(out)
    }

    /// # Errors
    ///
    /// Returns `MarkingServiceError::PermissionDenied` without `can_view_sittings`.
    /// Returns `MarkingServiceError::Storage` (`NotFound`) for an unknown sitting.
    pub async fn detail(
        &self,
        viewer: &User,
        sitting_id: SittingId,
    ) -> Result<MarkingDetail, MarkingServiceError> {
        ensure_marker(viewer)?;
        let sitting = self.sittings.get_sitting(sitting_id).await?;
        let quiz = self.quizzes.get_quiz(sitting.quiz_id()).await?;
        let user = self.users.get_user(sitting.user_id()).await?;
        let questions =
            result_questions(self.questions.as_ref(), self.sittings.as_ref(), &sitting).await?;
        Ok(MarkingDetail {
            user_id: user.id(),
            user: user.display_name().to_string(),
            sitting: SittingSummary::from_sitting(&sitting, &quiz),
            questions,
        })
    }

    /// Flip one question between correct and incorrect, adjusting the score.
    ///
    /// # Errors
    ///
    /// Returns `MarkingServiceError::PermissionDenied` without `can_view_sittings`.
    /// Returns `MarkingServiceError::Sitting` for an open sitting or unknown order.
    /// Returns `MarkingServiceError::Storage` (`NotFound`) for an unknown sitting.
    pub async fn toggle(
        &self,
        viewer: &User,
        sitting_id: SittingId,
        order: u32,
    ) -> Result<ToggleOutcome, MarkingServiceError> {
        ensure_marker(viewer)?;
        let sitting = self.sittings.toggle_mark(sitting_id, order).await?;
        let mark = sitting
            .mark_at(order)
            .ok_or(SittingError::UnknownOrder(order))?;

        tracing::info!(
            sitting_id = %sitting_id,
            order,
            marker = %viewer.id(),
            correct = mark == AnswerMark::Correct,
            "sitting mark toggled"
        );
        Ok(ToggleOutcome {
            order,
            mark,
            score: sitting.current_score(),
            percent: sitting.percent_correct(),
        })
    }
}

fn ensure_marker(viewer: &User) -> Result<(), MarkingServiceError> {
    if viewer.permissions().has_view_sittings() {
        Ok(())
    } else {
        Err(MarkingServiceError::PermissionDenied)
    }
}

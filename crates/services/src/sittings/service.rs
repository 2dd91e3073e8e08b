use std::collections::HashMap;
use std::sync::Arc;

use rand::rng;
use rand::seq::SliceRandom;

use quiz_core::model::{
    Guess, NewSitting, Question, Quiz, QuizId, QuizSlug, Sitting, SittingError, SittingId,
    SittingMode, User,
};
use storage::repository::{
    AnswerRecord, CategoryRepository, QuestionRepository, QuizRepository, SittingRepository,
    StorageError,
};

use super::plan::SittingPlanner;
use super::view::{
    AnswerOutcome, AnswerReveal, ExplanationView, QuestionView, ResultQuestion, SittingResult,
    SittingSummary, StartOutcome,
};
use crate::Clock;
use crate::error::SittingServiceError;

/// Stored answers to auto-marked questions are capped; essays are kept whole.
const MAX_STORED_ANSWER_LEN: usize = 50;

/// Drives a user through a quiz: start, answer, finish.
#[derive(Clone)]
pub struct SittingService {
    clock: Clock,
    quizzes: Arc<dyn QuizRepository>,
    questions: Arc<dyn QuestionRepository>,
    categories: Arc<dyn CategoryRepository>,
    sittings: Arc<dyn SittingRepository>,
}

impl SittingService {
    #[must_use]
    pub fn new(
        clock: Clock,
        quizzes: Arc<dyn QuizRepository>,
        questions: Arc<dyn QuestionRepository>,
        categories: Arc<dyn CategoryRepository>,
        sittings: Arc<dyn SittingRepository>,
    ) -> Self {
        Self {
            clock,
            quizzes,
            questions,
            categories,
            sittings,
        }
    }

    /// Resume the user's open sitting for this quiz and mode, or create one.
    ///
    /// # Errors
    ///
    /// Returns `SittingServiceError::PermissionDenied` for a draft the user may not edit.
    /// Returns `SittingServiceError::Sitting` (`NoQuestions`) for a quiz without questions.
    /// Returns `SittingServiceError::Storage` (`NotFound`) for an unknown quiz.
    pub async fn start(
        &self,
        user: &User,
        raw_slug: &str,
        mode: SittingMode,
    ) -> Result<StartOutcome, SittingServiceError> {
        let slug = QuizSlug::normalize(raw_slug).map_err(|_| StorageError::NotFound)?;
        let quiz = self
            .quizzes
            .find_quiz_by_slug(&slug)
            .await?
            .ok_or(StorageError::NotFound)?;
        if !quiz.is_visible_to(user.permissions().has_edit_quizzes()) {
            return Err(SittingServiceError::PermissionDenied);
        }

        if quiz.single_attempt()
            && self
                .sittings
                .has_completed_sitting(user.id(), quiz.id(), mode)
                .await?
        {
            return Ok(StartOutcome::AlreadyCompleted { quiz_id: quiz.id() });
        }

        if let Some(open) = self
            .sittings
            .find_open_sitting(user.id(), quiz.id(), mode)
            .await?
        {
            return Ok(StartOutcome::Started {
                sitting_id: open.id(),
                first_order: 1,
            });
        }

        let questions = self.questions.questions_for_quiz(quiz.id()).await?;
        let order = SittingPlanner::new(&quiz).build(&questions);
        let new = NewSitting::new(user.id(), quiz.id(), mode, order, self.clock.now())?;
        let sitting_id = self.sittings.insert_sitting(new).await?;
        tracing::info!(
            sitting_id = %sitting_id,
            user_id = %user.id(),
            quiz = %quiz.slug(),
            mode = mode.as_str(),
            "sitting started"
        );

        Ok(StartOutcome::Started {
            sitting_id,
            first_order: 1,
        })
    }

    /// Render one question of the user's sitting.
    ///
    /// # Errors
    ///
    /// Returns `SittingServiceError::Sitting` (`UnknownOrder`) for an order outside the sitting.
    /// Returns `SittingServiceError::Storage` (`NotFound`) when the sitting is not the user's.
    pub async fn question_view(
        &self,
        user: &User,
        sitting_id: SittingId,
        order: u32,
    ) -> Result<QuestionView, SittingServiceError> {
        let sitting = self.owned_sitting(user, sitting_id).await?;
        let question = self.question_at(&sitting, order).await?;
        let quiz = self.quizzes.get_quiz(sitting.quiz_id()).await?;
        let answer = self.sittings.get_user_answer(sitting_id, order).await?;

        let mut answers = question.display_answers();
        if question.shuffles_answers() {
            answers.as_mut_slice().shuffle(&mut rng());
        }

        Ok(QuestionView::build(
            &quiz, &sitting, order, &question, answers, &answer,
        ))
    }

    /// Check an answer and record it together with the user's category progress.
    ///
    /// # Errors
    ///
    /// Returns `SittingServiceError::Guess` when the guess does not fit the question.
    /// Returns `SittingServiceError::Sitting` when the order is unknown, already answered
    /// or the sitting is complete.
    /// Returns `SittingServiceError::Storage` (`NotFound`) when the sitting is not the user's.
    pub async fn submit_answer(
        &self,
        user: &User,
        sitting_id: SittingId,
        order: u32,
        guess: Guess,
    ) -> Result<AnswerOutcome, SittingServiceError> {
        let sitting = self.owned_sitting(user, sitting_id).await?;
        let question = self.question_at(&sitting, order).await?;
        let is_correct = question.check(&guess)?;
        let category = match question.category_id {
            Some(id) => Some(self.categories.get_category(id).await?.name().clone()),
            None => None,
        };

        let sitting = self
            .sittings
            .record_answer(AnswerRecord {
                sitting: sitting_id,
                order,
                is_correct,
                answer: stored_answer(&question, &guess),
                stored_correct: (!question.needs_manual_marking()).then_some(is_correct),
                category,
            })
            .await?;

        let next_order = sitting.next_order(order);
        match sitting.mode() {
            SittingMode::Study => Ok(AnswerOutcome::Revealed(AnswerReveal {
                order,
                is_correct,
                needs_manual_marking: question.needs_manual_marking(),
                user_answer: question.answer_to_string(&guess),
                correct_answers: question
                    .display_answers()
                    .into_iter()
                    .filter(|a| a.correct)
                    .collect(),
                explanation: question.explanation.clone(),
                next_order,
            })),
            SittingMode::Exam => Ok(AnswerOutcome::Next { next_order }),
        }
    }

    /// Question explanation alongside the user's answer.
    ///
    /// # Errors
    ///
    /// Same as [`SittingService::question_view`].
    pub async fn explanation(
        &self,
        user: &User,
        sitting_id: SittingId,
        order: u32,
    ) -> Result<ExplanationView, SittingServiceError> {
        let sitting = self.owned_sitting(user, sitting_id).await?;
        let question = self.question_at(&sitting, order).await?;
        let answer = self.sittings.get_user_answer(sitting_id, order).await?;
        Ok(ExplanationView {
            sitting_id,
            order,
            question_count: sitting.question_count(),
            content: question.content,
            explanation: question.explanation,
            user_answer: answer.answer,
            is_correct: answer.is_correct,
        })
    }

    /// Complete the sitting and score it. Sittings of quizzes that are not exam
    /// papers are deleted once the result is built.
    ///
    /// # Errors
    ///
    /// Returns `SittingServiceError::Storage` (`NotFound`) when the sitting is not the user's.
    pub async fn finish(
        &self,
        user: &User,
        sitting_id: SittingId,
    ) -> Result<SittingResult, SittingServiceError> {
        self.owned_sitting(user, sitting_id).await?;
        let sitting = self
            .sittings
            .complete_sitting(sitting_id, self.clock.now())
            .await?;

        let quiz = self.quizzes.get_quiz(sitting.quiz_id()).await?;
        let questions = match sitting.mode() {
            SittingMode::Exam => self.result_questions(&sitting).await?,
            SittingMode::Study => Vec::new(),
        };
        let mut result = SittingResult::build(&quiz, &sitting, questions);

        if !quiz.exam_paper() {
            self.sittings.delete_sitting(sitting_id).await?;
            result.kept = false;
        }
        tracing::info!(
            sitting_id = %sitting_id,
            user_id = %user.id(),
            percent = result.percent,
            passed = result.passed,
            kept = result.kept,
            "sitting finished"
        );
        Ok(result)
    }

    /// Score sheet of a completed sitting with every question.
    ///
    /// # Errors
    ///
    /// Returns `SittingServiceError::Sitting` (`NotComplete`) for an open sitting.
    /// Returns `SittingServiceError::Storage` (`NotFound`) when the sitting is not the user's.
    pub async fn results(
        &self,
        user: &User,
        sitting_id: SittingId,
    ) -> Result<SittingResult, SittingServiceError> {
        let sitting = self.owned_sitting(user, sitting_id).await?;
        if !sitting.is_complete() {
            return Err(SittingError::NotComplete.into());
        }
        let quiz = self.quizzes.get_quiz(sitting.quiz_id()).await?;
        let questions = self.result_questions(&sitting).await?;
        Ok(SittingResult::build(&quiz, &sitting, questions))
    }

    /// All sittings of the user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `SittingServiceError::Storage` if repository access fails.
    pub async fn list_sittings(
        &self,
        user: &User,
    ) -> Result<Vec<SittingSummary>, SittingServiceError> {
        let sittings = self.sittings.list_user_sittings(user.id()).await?;
        summarize(self.quizzes.as_ref(), &sittings).await
    }

    /// # Errors
    ///
    /// Returns `SittingServiceError::Storage` (`NotFound`) when the sitting is not the user's.
    pub async fn delete(&self, user: &User, sitting_id: SittingId) -> Result<(), SittingServiceError> {
        self.owned_sitting(user, sitting_id).await?;
        self.sittings.delete_sitting(sitting_id).await?;
        tracing::info!(sitting_id = %sitting_id, user_id = %user.id(), "sitting deleted");
        Ok(())
    }

    async fn owned_sitting(
        &self,
        user: &User,
        sitting_id: SittingId,
    ) -> Result<Sitting, SittingServiceError> {
        let sitting = self.sittings.get_sitting(sitting_id).await?;
        if sitting.user_id() != user.id() {
            return Err(StorageError::NotFound.into());
        }
        Ok(sitting)
    }

    async fn question_at(
        &self,
        sitting: &Sitting,
        order: u32,
    ) -> Result<Question, SittingServiceError> {
        let id = sitting
            .question_at(order)
            .ok_or(SittingError::UnknownOrder(order))?;
        Ok(self.questions.get_question(id).await?)
    }

    async fn result_questions(
        &self,
        sitting: &Sitting,
    ) -> Result<Vec<ResultQuestion>, SittingServiceError> {
        Ok(result_questions(self.questions.as_ref(), self.sittings.as_ref(), sitting).await?)
    }
}

pub(crate) async fn result_questions(
    questions: &dyn QuestionRepository,
    sittings: &dyn SittingRepository,
    sitting: &Sitting,
) -> Result<Vec<ResultQuestion>, StorageError> {
    let answers = sittings.list_user_answers(sitting.id()).await?;
    let mut out = Vec::with_capacity(answers.len());
    for answer in &answers {
        let question = questions.get_question(answer.question_id).await?;
        out.push(ResultQuestion::build(sitting, &question, answer));
    }
    Ok(out)
}

pub(crate) async fn summarize<E>(
    quizzes: &dyn QuizRepository,
    sittings: &[Sitting],
) -> Result<Vec<SittingSummary>, E>
where
    E: From<StorageError>,
{
    let mut cache: HashMap<QuizId, Quiz> = HashMap::new();
    let mut out = Vec::with_capacity(sittings.len());
    for sitting in sittings {
        let quiz = match cache.get(&sitting.quiz_id()) {
            Some(quiz) => quiz.clone(),
            None => {
                let quiz = quizzes.get_quiz(sitting.quiz_id()).await?;
                cache.insert(quiz.id(), quiz.clone());
                quiz
            }
        };
        out.push(SittingSummary::from_sitting(sitting, &quiz));
    }
    Ok(out)
}

fn stored_answer(question: &Question, guess: &Guess) -> String {
    let raw = guess.encode();
    if question.needs_manual_marking() {
        raw
    } else {
        raw.chars().take(MAX_STORED_ANSWER_LEN).collect()
    }
}

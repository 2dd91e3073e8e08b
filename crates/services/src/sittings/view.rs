use chrono::{DateTime, Utc};
use serde::Serialize;

use quiz_core::model::{
    AnswerId, AnswerMark, DisplayAnswer, Question, QuestionId, Quiz, QuizId, Sitting, SittingId,
    SittingMode, UserAnswer,
};

/// Result of asking to take a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StartOutcome {
    Started {
        sitting_id: SittingId,
        first_order: u32,
    },
    /// Single attempt quiz the user already finished in this mode.
    AlreadyCompleted { quiz_id: QuizId },
}

/// Answer choice as shown to the user. `correct` stays hidden until revealed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerChoice {
    pub id: Option<AnswerId>,
    pub content: String,
    pub correct: Option<bool>,
}

impl AnswerChoice {
    fn from_display(answer: DisplayAnswer, reveal: bool) -> Self {
        Self {
            id: answer.id,
            content: answer.content,
            correct: reveal.then_some(answer.correct),
        }
    }
}

/// Everything needed to render one question of a sitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub sitting_id: SittingId,
    pub quiz_title: String,
    pub mode: SittingMode,
    pub order: u32,
    pub question_count: usize,
    pub answered: usize,
    pub question_id: QuestionId,
    pub question_type: &'static str,
    pub content: String,
    pub figure: Option<String>,
    pub allow_multiple_answers: bool,
    pub answers: Vec<AnswerChoice>,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub revealed: bool,
    pub next_order: Option<u32>,
}

impl QuestionView {
    pub(crate) fn build(
        quiz: &Quiz,
        sitting: &Sitting,
        order: u32,
        question: &Question,
        answers: Vec<DisplayAnswer>,
        user_answer: &UserAnswer,
    ) -> Self {
        let revealed = reveals(sitting, order);
        let (answered, total) = sitting.progress();
        Self {
            sitting_id: sitting.id(),
            quiz_title: quiz.title().to_string(),
            mode: sitting.mode(),
            order,
            question_count: total,
            answered,
            question_id: question.id,
            question_type: question.type_name(),
            content: question.content.clone(),
            figure: question.figure.clone(),
            allow_multiple_answers: allows_multiple(question),
            answers: answers
                .into_iter()
                .map(|a| AnswerChoice::from_display(a, revealed))
                .collect(),
            user_answer: user_answer.answer.clone(),
            is_correct: if revealed { user_answer.is_correct } else { None },
            revealed,
            next_order: sitting.next_order(order),
        }
    }
}

/// Correct answers are shown after a study answer or once the sitting is over.
pub(crate) fn reveals(sitting: &Sitting, order: u32) -> bool {
    sitting.is_complete()
        || (sitting.mode() == SittingMode::Study
            && sitting.mark_at(order).is_some_and(AnswerMark::is_answered))
}

fn allows_multiple(question: &Question) -> bool {
    match &question.kind {
        quiz_core::model::QuestionKind::MultipleChoice(mc) => mc.allow_multiple_answers,
        _ => false,
    }
}

/// What happens after an answer is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnswerOutcome {
    /// Study mode stays on the question and shows the outcome.
    Revealed(AnswerReveal),
    /// Exam mode moves on; `None` after the last question.
    Next { next_order: Option<u32> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerReveal {
    pub order: u32,
    pub is_correct: bool,
    pub needs_manual_marking: bool,
    pub user_answer: String,
    pub correct_answers: Vec<DisplayAnswer>,
    pub explanation: String,
    pub next_order: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplanationView {
    pub sitting_id: SittingId,
    pub order: u32,
    pub question_count: usize,
    pub content: String,
    pub explanation: String,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
}

/// One question of a finished sitting with the user's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultQuestion {
    pub order: u32,
    pub question_id: QuestionId,
    pub question_type: &'static str,
    pub content: String,
    pub explanation: String,
    pub answers: Vec<DisplayAnswer>,
    pub user_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub mark: AnswerMark,
    pub needs_manual_marking: bool,
}

impl ResultQuestion {
    pub(crate) fn build(sitting: &Sitting, question: &Question, answer: &UserAnswer) -> Self {
        Self {
            order: answer.order,
            question_id: question.id,
            question_type: question.type_name(),
            content: question.content.clone(),
            explanation: question.explanation.clone(),
            answers: question.display_answers(),
            user_answer: answer.answer.clone(),
            is_correct: answer.is_correct,
            mark: sitting
                .mark_at(answer.order)
                .unwrap_or(AnswerMark::Unanswered),
            needs_manual_marking: question.needs_manual_marking(),
        }
    }
}

/// Score sheet of a finished sitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SittingResult {
    pub sitting_id: SittingId,
    pub quiz_id: QuizId,
    pub quiz_title: String,
    pub mode: SittingMode,
    pub score: i64,
    pub max_score: usize,
    pub percent: u8,
    pub passed: bool,
    pub message: String,
    /// False when the quiz is not an exam paper and the sitting was discarded.
    pub kept: bool,
    pub questions: Vec<ResultQuestion>,
}

impl SittingResult {
    pub(crate) fn build(quiz: &Quiz, sitting: &Sitting, questions: Vec<ResultQuestion>) -> Self {
        let passed = sitting.passed(quiz.pass_mark());
        Self {
            sitting_id: sitting.id(),
            quiz_id: quiz.id(),
            quiz_title: quiz.title().to_string(),
            mode: sitting.mode(),
            score: sitting.current_score(),
            max_score: sitting.max_score(),
            percent: sitting.percent_correct(),
            passed,
            message: quiz.result_message(passed).to_string(),
            kept: true,
            questions,
        }
    }
}

/// Row of a sitting listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SittingSummary {
    pub id: SittingId,
    pub quiz_id: QuizId,
    pub quiz_title: String,
    pub mode: SittingMode,
    pub complete: bool,
    pub score: i64,
    pub max_score: usize,
    pub percent: u8,
    pub passed: bool,
    pub answered: usize,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl SittingSummary {
    #[must_use]
    pub fn from_sitting(sitting: &Sitting, quiz: &Quiz) -> Self {
        let (answered, _) = sitting.progress();
        Self {
            id: sitting.id(),
            quiz_id: quiz.id(),
            quiz_title: quiz.title().to_string(),
            mode: sitting.mode(),
            complete: sitting.is_complete(),
            score: sitting.current_score(),
            max_score: sitting.max_score(),
            percent: sitting.percent_correct(),
            passed: sitting.passed(quiz.pass_mark()),
            answered,
            start: sitting.start(),
            end: sitting.end(),
        }
    }
}

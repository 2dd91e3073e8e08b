use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId, SittingId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SittingError {
    #[error(
        "this quiz does not contain any question. Please configure questions properly"
    )]
    NoQuestions,

    #[error("question order {0} is not part of this sitting")]
    UnknownOrder(u32),

    #[error("question {0} has already been answered")]
    AlreadyAnswered(u32),

    #[error("sitting is already complete")]
    Completed,

    #[error("sitting is not complete yet")]
    NotComplete,

    #[error("unknown sitting mode: {0}")]
    UnknownMode(String),

    #[error("invalid question order list: {0}")]
    InvalidQuestionOrder(String),

    #[error("invalid user answers: {0}")]
    InvalidMarks(String),
}

//
// ─── MODE & MARKS ──────────────────────────────────────────────────────────────
//

/// Study mode reveals the outcome after each answer, exam mode moves on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SittingMode {
    #[default]
    Study,
    Exam,
}

impl SittingMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SittingMode::Study => "study",
            SittingMode::Exam => "exam",
        }
    }

    /// # Errors
    ///
    /// Returns `SittingError::UnknownMode` for anything but `study|exam`.
    pub fn parse(value: &str) -> Result<Self, SittingError> {
        match value {
            "study" => Ok(Self::Study),
            "exam" => Ok(Self::Exam),
            other => Err(SittingError::UnknownMode(other.to_string())),
        }
    }
}

/// Per-question state, persisted as `"?"`, `0` or `1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerMark {
    Unanswered,
    Incorrect,
    Correct,
}

impl AnswerMark {
    #[must_use]
    pub fn from_outcome(is_correct: bool) -> Self {
        if is_correct {
            Self::Correct
        } else {
            Self::Incorrect
        }
    }

    #[must_use]
    pub fn is_answered(self) -> bool {
        !matches!(self, AnswerMark::Unanswered)
    }

    fn to_json(self) -> serde_json::Value {
        match self {
            AnswerMark::Unanswered => serde_json::Value::from("?"),
            AnswerMark::Incorrect => serde_json::Value::from(0),
            AnswerMark::Correct => serde_json::Value::from(1),
        }
    }

    fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if s == "?" => Some(Self::Unanswered),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(0) => Some(Self::Incorrect),
                Some(1) => Some(Self::Correct),
                _ => None,
            },
            _ => None,
        }
    }
}

impl Serialize for AnswerMark {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AnswerMark {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Self::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid answer mark: {value}")))
    }
}

//
// ─── WIRE HELPERS ──────────────────────────────────────────────────────────────
//

/// Encode question ids as a comma separated list with a trailing comma.
#[must_use]
pub fn encode_question_order(ids: &[QuestionId]) -> String {
    let mut out = String::new();
    for id in ids {
        out.push_str(&id.to_string());
        out.push(',');
    }
    out
}

/// Decode a comma separated integer list; empty items are skipped.
///
/// # Errors
///
/// Returns `SittingError::InvalidQuestionOrder` if an item is not an integer.
pub fn decode_question_order(raw: &str) -> Result<Vec<QuestionId>, SittingError> {
    raw.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<QuestionId>()
                .map_err(|_| SittingError::InvalidQuestionOrder(raw.to_string()))
        })
        .collect()
}

/// Encode the marks as a JSON object keyed by question order.
#[must_use]
pub fn encode_marks(marks: &BTreeMap<u32, AnswerMark>) -> String {
    let object: serde_json::Map<String, serde_json::Value> = marks
        .iter()
        .map(|(order, mark)| (order.to_string(), mark.to_json()))
        .collect();
    serde_json::Value::Object(object).to_string()
}

/// # Errors
///
/// Returns `SittingError::InvalidMarks` for malformed JSON, keys or values.
pub fn decode_marks(raw: &str) -> Result<BTreeMap<u32, AnswerMark>, SittingError> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| SittingError::InvalidMarks(e.to_string()))?;
    let serde_json::Value::Object(object) = value else {
        return Err(SittingError::InvalidMarks("expected an object".into()));
    };
    let mut marks = BTreeMap::new();
    for (key, value) in &object {
        let order = key
            .parse::<u32>()
            .map_err(|_| SittingError::InvalidMarks(format!("invalid order: {key}")))?;
        let mark = AnswerMark::from_json(value)
            .ok_or_else(|| SittingError::InvalidMarks(format!("invalid mark: {value}")))?;
        marks.insert(order, mark);
    }
    Ok(marks)
}

//
// ─── SITTING ───────────────────────────────────────────────────────────────────
//

/// A user's attempt at a quiz.
///
/// Question orders are 1-based positions in `question_order`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sitting {
    id: SittingId,
    user_id: UserId,
    quiz_id: QuizId,
    mode: SittingMode,
    question_order: Vec<QuestionId>,
    current_score: i64,
    complete: bool,
    marks: BTreeMap<u32, AnswerMark>,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
}

/// Sitting before storage assigned an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSitting {
    pub user_id: UserId,
    pub quiz_id: QuizId,
    pub mode: SittingMode,
    pub question_order: Vec<QuestionId>,
    pub start: DateTime<Utc>,
}

impl NewSitting {
    /// # Errors
    ///
    /// Returns `SittingError::NoQuestions` when `question_order` is empty.
    pub fn new(
        user_id: UserId,
        quiz_id: QuizId,
        mode: SittingMode,
        question_order: Vec<QuestionId>,
        start: DateTime<Utc>,
    ) -> Result<Self, SittingError> {
        if question_order.is_empty() {
            return Err(SittingError::NoQuestions);
        }
        Ok(Self {
            user_id,
            quiz_id,
            mode,
            question_order,
            start,
        })
    }

    #[must_use]
    pub fn assign_id(self, id: SittingId) -> Sitting {
        let marks = (1..=self.question_order.len())
            .map(|order| (order_u32(order), AnswerMark::Unanswered))
            .collect();
        Sitting {
            id,
            user_id: self.user_id,
            quiz_id: self.quiz_id,
            mode: self.mode,
            question_order: self.question_order,
            current_score: 0,
            complete: false,
            marks,
            start: self.start,
            end: None,
        }
    }
}

fn order_u32(order: usize) -> u32 {
    u32::try_from(order).unwrap_or(u32::MAX)
}

impl Sitting {
    /// Rehydrate a sitting from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `SittingError::InvalidMarks` if a mark refers to an order that
    /// is not part of `question_order`.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SittingId,
        user_id: UserId,
        quiz_id: QuizId,
        mode: SittingMode,
        question_order: Vec<QuestionId>,
        current_score: i64,
        complete: bool,
        mut marks: BTreeMap<u32, AnswerMark>,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, SittingError> {
        let total = order_u32(question_order.len());
        if let Some(bad) = marks.keys().find(|order| **order == 0 || **order > total) {
            return Err(SittingError::InvalidMarks(format!(
                "order {bad} out of range"
            )));
        }
        for order in 1..=total {
            marks.entry(order).or_insert(AnswerMark::Unanswered);
        }
        Ok(Self {
            id,
            user_id,
            quiz_id,
            mode,
            question_order,
            current_score,
            complete,
            marks,
            start,
            end,
        })
    }

    #[must_use]
    pub fn id(&self) -> SittingId {
        self.id
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn mode(&self) -> SittingMode {
        self.mode
    }

    #[must_use]
    pub fn question_order(&self) -> &[QuestionId] {
        &self.question_order
    }

    #[must_use]
    pub fn current_score(&self) -> i64 {
        self.current_score
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    #[must_use]
    pub fn marks(&self) -> &BTreeMap<u32, AnswerMark> {
        &self.marks
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn add_to_score(&mut self, points: i64) {
        self.current_score += points;
    }

    /// Number of questions, which is also the maximum score.
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.question_order.len()
    }

    #[must_use]
    pub fn max_score(&self) -> usize {
        self.question_count()
    }

    /// Rounded percentage of correct answers, clamped to `0..=100`.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn percent_correct(&self) -> u8 {
        let divisor = self.question_count();
        if divisor < 1 {
            return 0;
        }
        let dividend = self.current_score;
        if dividend > i64::try_from(divisor).unwrap_or(i64::MAX) {
            return 100;
        }
        let correct = ((dividend as f64 / divisor as f64) * 100.0).round();
        if correct >= 1.0 { correct as u8 } else { 0 }
    }

    #[must_use]
    pub fn passed(&self, pass_mark: u8) -> bool {
        self.percent_correct() >= pass_mark
    }

    #[must_use]
    pub fn question_at(&self, order: u32) -> Option<QuestionId> {
        let index = usize::try_from(order).ok()?.checked_sub(1)?;
        self.question_order.get(index).copied()
    }

    #[must_use]
    pub fn mark_at(&self, order: u32) -> Option<AnswerMark> {
        self.marks.get(&order).copied()
    }

    /// The order following `after`, if there is one.
    #[must_use]
    pub fn next_order(&self, after: u32) -> Option<u32> {
        let next = after.checked_add(1)?;
        self.question_at(next).map(|_| next)
    }

    /// Record the outcome of answering the question at `order`.
    ///
    /// # Errors
    ///
    /// Returns `SittingError::Completed`, `SittingError::UnknownOrder` or
    /// `SittingError::AlreadyAnswered`.
    pub fn record_answer(&mut self, order: u32, is_correct: bool) -> Result<(), SittingError> {
        if self.complete {
            return Err(SittingError::Completed);
        }
        let mark = self
            .marks
            .get_mut(&order)
            .ok_or(SittingError::UnknownOrder(order))?;
        if mark.is_answered() {
            return Err(SittingError::AlreadyAnswered(order));
        }
        *mark = AnswerMark::from_outcome(is_correct);
        if is_correct {
            self.add_to_score(1);
        }
        Ok(())
    }

    /// Flip the correctness of an answer on a completed sitting.
    ///
    /// Unanswered questions count as incorrect and become correct.
    ///
    /// # Errors
    ///
    /// Returns `SittingError::NotComplete` or `SittingError::UnknownOrder`.
    pub fn toggle_mark(&mut self, order: u32) -> Result<AnswerMark, SittingError> {
        if !self.complete {
            return Err(SittingError::NotComplete);
        }
        let mark = self
            .marks
            .get_mut(&order)
            .ok_or(SittingError::UnknownOrder(order))?;
        let (next, delta) = match *mark {
            AnswerMark::Correct => (AnswerMark::Incorrect, -1),
            AnswerMark::Incorrect | AnswerMark::Unanswered => (AnswerMark::Correct, 1),
        };
        *mark = next;
        self.add_to_score(delta);
        Ok(next)
    }

    /// Mark the sitting complete. Calling it again keeps the first end time.
    pub fn mark_complete(&mut self, now: DateTime<Utc>) {
        if !self.complete {
            self.complete = true;
            self.end = Some(now);
        }
    }

    /// `(answered, total)`.
    #[must_use]
    pub fn progress(&self) -> (usize, usize) {
        let answered = self.marks.values().filter(|m| m.is_answered()).count();
        (answered, self.question_count())
    }

    #[must_use]
    pub fn unanswered_orders(&self) -> Vec<u32> {
        self.marks
            .iter()
            .filter(|(_, mark)| !mark.is_answered())
            .map(|(order, _)| *order)
            .collect()
    }

    #[must_use]
    pub fn unanswered_count(&self) -> usize {
        self.unanswered_orders().len()
    }

    #[must_use]
    pub fn score_list(&self) -> Vec<(u32, AnswerMark)> {
        self.marks.iter().map(|(o, m)| (*o, *m)).collect()
    }

    /// Orders currently marked incorrect.
    #[must_use]
    pub fn incorrect_orders(&self) -> Vec<u32> {
        self.marks
            .iter()
            .filter(|(_, mark)| matches!(mark, AnswerMark::Incorrect))
            .map(|(order, _)| *order)
            .collect()
    }
}

//
// ─── USER ANSWER ───────────────────────────────────────────────────────────────
//

/// The stored answer of one question inside a sitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAnswer {
    pub sitting_id: SittingId,
    pub user_id: UserId,
    pub order: u32,
    pub question_id: QuestionId,
    pub answer: Option<String>,
    pub is_correct: Option<bool>,
}

impl UserAnswer {
    #[must_use]
    pub fn blank(sitting_id: SittingId, user_id: UserId, order: u32, question_id: QuestionId) -> Self {
        Self {
            sitting_id,
            user_id,
            order,
            question_id,
            answer: None,
            is_correct: None,
        }
    }

    /// One blank answer per question, in sitting order.
    #[must_use]
    pub fn blanks_for(sitting: &Sitting) -> Vec<Self> {
        sitting
            .question_order()
            .iter()
            .enumerate()
            .map(|(index, question_id)| {
                Self::blank(
                    sitting.id(),
                    sitting.user_id(),
                    order_u32(index + 1),
                    *question_id,
                )
            })
            .collect()
    }
}

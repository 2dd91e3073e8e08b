use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{AnswerId, CategoryId, QuestionId, QuizId, SubCategoryId};

const MAX_CONTENT_LEN: usize = 1000;
const MAX_EXPLANATION_LEN: usize = 2000;
const MAX_OPEN_ANSWER_LEN: usize = 50;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question content cannot be empty")]
    EmptyContent,

    #[error("question content is longer than {MAX_CONTENT_LEN} characters")]
    ContentTooLong,

    #[error("explanation is longer than {MAX_EXPLANATION_LEN} characters")]
    ExplanationTooLong,

    #[error("a multiple choice question needs at least one answer")]
    NoAnswers,

    #[error("a multiple choice question needs at least one correct answer")]
    NoCorrectAnswer,

    #[error("answer content cannot be empty")]
    EmptyAnswer,

    #[error("answer content is longer than {MAX_CONTENT_LEN} characters")]
    AnswerTooLong,

    #[error("expected answer cannot be empty")]
    EmptyExpectedAnswer,

    #[error("expected answer is longer than {MAX_OPEN_ANSWER_LEN} characters")]
    ExpectedAnswerTooLong,

    #[error("this is not a valid number: {0}")]
    InvalidNumber(String),
}

/// Problems with the shape of a user's guess. A wrong answer is not an error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GuessError {
    #[error("guess does not fit a {0} question")]
    WrongShape(&'static str),

    #[error("answer {0} does not belong to this question")]
    UnknownAnswer(AnswerId),

    #[error("exactly one answer must be selected")]
    SingleAnswerExpected,
}

//
// ─── SUBCLASS OPTIONS ──────────────────────────────────────────────────────────
//

/// Order in which multiple choice options are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerOrder {
    Content,
    Random,
    #[serde(rename = "none")]
    AsEntered,
}

impl AnswerOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AnswerOrder::Content => "content",
            AnswerOrder::Random => "random",
            AnswerOrder::AsEntered => "none",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "content" => Some(Self::Content),
            "random" => Some(Self::Random),
            "none" => Some(Self::AsEntered),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAnswerType {
    #[default]
    Number,
    #[serde(rename = "string")]
    Text,
}

impl OpenAnswerType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OpenAnswerType::Number => "number",
            OpenAnswerType::Text => "string",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "number" => Some(Self::Number),
            "string" => Some(Self::Text),
            _ => None,
        }
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

/// Answer option as entered by an editor. Existing options keep their id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerDraft {
    #[serde(default)]
    pub id: Option<AnswerId>,
    pub content: String,
    #[serde(default)]
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKindDraft {
    MultipleChoice {
        #[serde(default)]
        answer_order: Option<AnswerOrder>,
        #[serde(default)]
        allow_multiple_answers: bool,
        answers: Vec<AnswerDraft>,
    },
    TrueFalse {
        correct: bool,
    },
    Open {
        answer: String,
        #[serde(default)]
        answer_type: OpenAnswerType,
    },
    Essay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub content: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub sub_category_id: Option<SubCategoryId>,
    #[serde(default)]
    pub figure: Option<String>,
    #[serde(default)]
    pub quiz_ids: Vec<QuizId>,
    #[serde(flatten)]
    pub kind: QuestionKindDraft,
}

impl QuestionDraft {
    /// Validate the shared fields and the subclass specific rules.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` describing the first failing rule.
    pub fn validate(self) -> Result<ValidatedQuestion, QuestionError> {
        let content = self.content.trim().to_string();
        if content.is_empty() {
            return Err(QuestionError::EmptyContent);
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(QuestionError::ContentTooLong);
        }
        let explanation = self.explanation.trim().to_string();
        if explanation.chars().count() > MAX_EXPLANATION_LEN {
            return Err(QuestionError::ExplanationTooLong);
        }

        let kind = match self.kind {
            QuestionKindDraft::MultipleChoice {
                answer_order,
                allow_multiple_answers,
                answers,
            } => {
                if answers.is_empty() {
                    return Err(QuestionError::NoAnswers);
                }
                let mut cleaned = Vec::with_capacity(answers.len());
                for answer in answers {
                    let content = answer.content.trim().to_string();
                    if content.is_empty() {
                        return Err(QuestionError::EmptyAnswer);
                    }
                    if content.chars().count() > MAX_CONTENT_LEN {
                        return Err(QuestionError::AnswerTooLong);
                    }
                    cleaned.push(AnswerDraft {
                        id: answer.id,
                        content,
                        correct: answer.correct,
                    });
                }
                if !cleaned.iter().any(|a| a.correct) {
                    return Err(QuestionError::NoCorrectAnswer);
                }
                QuestionKindDraft::MultipleChoice {
                    answer_order,
                    allow_multiple_answers,
                    answers: cleaned,
                }
            }
            QuestionKindDraft::Open {
                answer,
                answer_type,
            } => {
                let answer = answer.trim().to_string();
                if answer.is_empty() {
                    return Err(QuestionError::EmptyExpectedAnswer);
                }
                if answer.chars().count() > MAX_OPEN_ANSWER_LEN {
                    return Err(QuestionError::ExpectedAnswerTooLong);
                }
                if answer_type == OpenAnswerType::Number
                    && !answer.parse::<f64>().is_ok_and(f64::is_finite)
                {
                    return Err(QuestionError::InvalidNumber(answer));
                }
                QuestionKindDraft::Open {
                    answer,
                    answer_type,
                }
            }
            other => other,
        };

        let mut quiz_ids = self.quiz_ids;
        quiz_ids.sort();
        quiz_ids.dedup();

        Ok(ValidatedQuestion {
            content,
            explanation,
            category_id: self.category_id,
            sub_category_id: self.sub_category_id,
            figure: self
                .figure
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty()),
            quiz_ids,
            kind,
        })
    }
}

/// Question input that passed validation but has no ids assigned yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedQuestion {
    pub content: String,
    pub explanation: String,
    pub category_id: Option<CategoryId>,
    pub sub_category_id: Option<SubCategoryId>,
    pub figure: Option<String>,
    pub quiz_ids: Vec<QuizId>,
    pub kind: QuestionKindDraft,
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    pub id: AnswerId,
    pub content: String,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipleChoice {
    pub answer_order: Option<AnswerOrder>,
    pub allow_multiple_answers: bool,
    pub answers: Vec<AnswerOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice(MultipleChoice),
    TrueFalse {
        correct: bool,
    },
    Open {
        answer: String,
        answer_type: OpenAnswerType,
    },
    Essay,
}

impl QuestionKind {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            QuestionKind::MultipleChoice(_) => "multiple_choice",
            QuestionKind::TrueFalse { .. } => "true_false",
            QuestionKind::Open { .. } => "open",
            QuestionKind::Essay => "essay",
        }
    }
}

/// A persisted question of any subclass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub content: String,
    pub explanation: String,
    pub category_id: Option<CategoryId>,
    pub sub_category_id: Option<SubCategoryId>,
    pub figure: Option<String>,
    pub quiz_ids: Vec<QuizId>,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

/// One displayable answer choice. `id` is only set for multiple choice options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayAnswer {
    pub id: Option<AnswerId>,
    pub content: String,
    pub correct: bool,
}

/// A user's answer to a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guess {
    Choices(Vec<AnswerId>),
    Bool(bool),
    Text(String),
}

impl Guess {
    /// Compact string kept next to the sitting.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Guess::Choices(ids) => ids
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
            Guess::Bool(true) => "True".to_string(),
            Guess::Bool(false) => "False".to_string(),
            Guess::Text(text) => text.clone(),
        }
    }

    /// Inverse of [`Guess::encode`] for a given question subclass.
    #[must_use]
    pub fn decode(kind: &QuestionKind, raw: &str) -> Option<Self> {
        match kind {
            QuestionKind::MultipleChoice(_) => raw
                .split(',')
                .filter(|part| !part.trim().is_empty())
                .map(|part| part.parse::<AnswerId>().ok())
                .collect::<Option<Vec<_>>>()
                .map(Guess::Choices),
            QuestionKind::TrueFalse { .. } => parse_bool(raw).map(Guess::Bool),
            QuestionKind::Open { .. } | QuestionKind::Essay => Some(Guess::Text(raw.to_string())),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

impl Question {
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    /// Essays are never marked correct automatically.
    #[must_use]
    pub fn needs_manual_marking(&self) -> bool {
        matches!(self.kind, QuestionKind::Essay)
    }

    /// Check a guess against the expected answer.
    ///
    /// # Errors
    ///
    /// Returns `GuessError` when the guess cannot apply to this question.
    pub fn check(&self, guess: &Guess) -> Result<bool, GuessError> {
        match (&self.kind, guess) {
            (QuestionKind::MultipleChoice(mc), Guess::Choices(ids)) => {
                if !mc.allow_multiple_answers && ids.len() != 1 {
                    return Err(GuessError::SingleAnswerExpected);
                }
                let mut all_correct = !ids.is_empty();
                for id in ids {
                    let option = mc
                        .answers
                        .iter()
                        .find(|a| a.id == *id)
                        .ok_or(GuessError::UnknownAnswer(*id))?;
                    all_correct &= option.correct;
                }
                Ok(all_correct)
            }
            (QuestionKind::TrueFalse { correct }, Guess::Bool(value)) => Ok(value == correct),
            (QuestionKind::TrueFalse { correct }, Guess::Text(text)) => parse_bool(text)
                .map(|value| value == *correct)
                .ok_or(GuessError::WrongShape("true_false")),
            (
                QuestionKind::Open {
                    answer,
                    answer_type,
                },
                Guess::Text(text),
            ) => Ok(check_open(answer, *answer_type, text)),
            (QuestionKind::Essay, Guess::Text(_)) => Ok(false),
            (kind, _) => Err(GuessError::WrongShape(kind.type_name())),
        }
    }

    /// Answer choices in display order. `AnswerOrder::Random` is left to the caller.
    #[must_use]
    pub fn display_answers(&self) -> Vec<DisplayAnswer> {
        match &self.kind {
            QuestionKind::MultipleChoice(mc) => {
                let mut answers: Vec<DisplayAnswer> = mc
                    .answers
                    .iter()
                    .map(|a| DisplayAnswer {
                        id: Some(a.id),
                        content: a.content.clone(),
                        correct: a.correct,
                    })
                    .collect();
                if mc.answer_order == Some(AnswerOrder::Content) {
                    answers.sort_by(|a, b| a.content.cmp(&b.content));
                }
                answers
            }
            QuestionKind::TrueFalse { correct } => vec![
                DisplayAnswer {
                    id: None,
                    content: "True".into(),
                    correct: *correct,
                },
                DisplayAnswer {
                    id: None,
                    content: "False".into(),
                    correct: !*correct,
                },
            ],
            QuestionKind::Open { answer, .. } => vec![DisplayAnswer {
                id: None,
                content: answer.clone(),
                correct: true,
            }],
            QuestionKind::Essay => Vec::new(),
        }
    }

    #[must_use]
    pub fn shuffles_answers(&self) -> bool {
        matches!(
            &self.kind,
            QuestionKind::MultipleChoice(MultipleChoice {
                answer_order: Some(AnswerOrder::Random),
                ..
            })
        )
    }

    /// Human readable rendering of a guess.
    #[must_use]
    pub fn answer_to_string(&self, guess: &Guess) -> String {
        match (&self.kind, guess) {
            (QuestionKind::MultipleChoice(mc), Guess::Choices(ids)) => ids
                .iter()
                .map(|id| {
                    mc.answers
                        .iter()
                        .find(|a| a.id == *id)
                        .map_or_else(|| id.to_string(), |a| a.content.clone())
                })
                .collect::<Vec<_>>()
                .join(", "),
            (_, guess) => guess.encode(),
        }
    }
}

fn check_open(expected: &str, answer_type: OpenAnswerType, guess: &str) -> bool {
    match answer_type {
        OpenAnswerType::Number => {
            match (guess.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
                (Ok(user), Ok(expected)) => user == expected,
                _ => false,
            }
        }
        OpenAnswerType::Text => guess.trim().to_lowercase() == expected.trim().to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mc(allow_multiple: bool) -> Question {
        Question {
            id: QuestionId::new(1),
            content: "squawk".into(),
            explanation: String::new(),
            category_id: None,
            sub_category_id: None,
            figure: None,
            quiz_ids: vec![QuizId::new(1)],
            kind: QuestionKind::MultipleChoice(MultipleChoice {
                answer_order: Some(AnswerOrder::Content),
                allow_multiple_answers: allow_multiple,
                answers: vec![
                    AnswerOption {
                        id: AnswerId::new(123),
                        content: "bing".into(),
                        correct: false,
                    },
                    AnswerOption {
                        id: AnswerId::new(456),
                        content: "bong".into(),
                        correct: true,
                    },
                    AnswerOption {
                        id: AnswerId::new(789),
                        content: "bang".into(),
                        correct: true,
                    },
                ],
            }),
        }
    }

    fn open(answer: &str, answer_type: OpenAnswerType) -> Question {
        Question {
            kind: QuestionKind::Open {
                answer: answer.into(),
                answer_type,
            },
            ..mc(false)
        }
    }

    #[test]
    fn single_choice_checks_one_answer() {
        let q = mc(false);
        assert!(q.check(&Guess::Choices(vec![AnswerId::new(456)])).unwrap());
        assert!(!q.check(&Guess::Choices(vec![AnswerId::new(123)])).unwrap());
        assert_eq!(
            q.check(&Guess::Choices(vec![AnswerId::new(456), AnswerId::new(789)]))
                .unwrap_err(),
            GuessError::SingleAnswerExpected
        );
    }

    #[test]
    fn multiple_choice_requires_every_pick_correct() {
        let q = mc(true);
        assert!(
            q.check(&Guess::Choices(vec![AnswerId::new(456), AnswerId::new(789)]))
                .unwrap()
        );
        assert!(
            !q.check(&Guess::Choices(vec![AnswerId::new(456), AnswerId::new(123)]))
                .unwrap()
        );
        assert!(!q.check(&Guess::Choices(Vec::new())).unwrap());
    }

    #[test]
    fn foreign_answer_id_is_an_error() {
        let q = mc(false);
        assert_eq!(
            q.check(&Guess::Choices(vec![AnswerId::new(999)])).unwrap_err(),
            GuessError::UnknownAnswer(AnswerId::new(999))
        );
    }

    #[test]
    fn content_order_sorts_answers() {
        let contents: Vec<String> = mc(false)
            .display_answers()
            .into_iter()
            .map(|a| a.content)
            .collect();
        assert_eq!(contents, vec!["bang", "bing", "bong"]);
    }

    #[test]
    fn true_false_accepts_bool_and_text() {
        let q = Question {
            kind: QuestionKind::TrueFalse { correct: true },
            ..mc(false)
        };
        assert!(q.check(&Guess::Bool(true)).unwrap());
        assert!(!q.check(&Guess::Text("FALSE".into())).unwrap());
        assert!(q.check(&Guess::Text("maybe".into())).is_err());

        let answers = q.display_answers();
        assert_eq!(answers[0].content, "True");
        assert!(answers[0].correct);
        assert!(!answers[1].correct);
    }

    #[test]
    fn open_number_compares_numerically() {
        let q = open("42", OpenAnswerType::Number);
        assert!(q.check(&Guess::Text("42.0".into())).unwrap());
        assert!(q.check(&Guess::Text(" 42 ".into())).unwrap());
        assert!(!q.check(&Guess::Text("41".into())).unwrap());
        assert!(!q.check(&Guess::Text("forty two".into())).unwrap());
    }

    #[test]
    fn open_text_ignores_case_and_padding() {
        let q = open("Paris", OpenAnswerType::Text);
        assert!(q.check(&Guess::Text("  paris ".into())).unwrap());
        assert!(!q.check(&Guess::Text("london".into())).unwrap());
    }

    #[test]
    fn essay_is_never_auto_correct() {
        let q = Question {
            kind: QuestionKind::Essay,
            ..mc(false)
        };
        assert!(q.needs_manual_marking());
        assert!(!q.check(&Guess::Text("a long essay".into())).unwrap());
        assert!(q.check(&Guess::Bool(true)).is_err());
    }

    #[test]
    fn guess_rendering_uses_answer_content() {
        let q = mc(true);
        let guess = Guess::Choices(vec![AnswerId::new(456), AnswerId::new(789)]);
        assert_eq!(q.answer_to_string(&guess), "bong, bang");
        assert_eq!(guess.encode(), "456,789");
        assert_eq!(Guess::decode(&q.kind, "456,789"), Some(guess));
    }

    fn draft(kind: QuestionKindDraft) -> QuestionDraft {
        QuestionDraft {
            content: " What is it? ".into(),
            explanation: String::new(),
            category_id: None,
            sub_category_id: None,
            figure: Some("  ".into()),
            quiz_ids: vec![QuizId::new(2), QuizId::new(1), QuizId::new(2)],
            kind,
        }
    }

    #[test]
    fn draft_validation_cleans_shared_fields() {
        let validated = draft(QuestionKindDraft::Essay).validate().unwrap();
        assert_eq!(validated.content, "What is it?");
        assert_eq!(validated.figure, None);
        assert_eq!(validated.quiz_ids, vec![QuizId::new(1), QuizId::new(2)]);
    }

    #[test]
    fn multiple_choice_draft_needs_a_correct_answer() {
        let err = draft(QuestionKindDraft::MultipleChoice {
            answer_order: None,
            allow_multiple_answers: false,
            answers: vec![AnswerDraft {
                id: None,
                content: "nope".into(),
                correct: false,
            }],
        })
        .validate()
        .unwrap_err();
        assert_eq!(err, QuestionError::NoCorrectAnswer);
    }

    #[test]
    fn open_number_draft_needs_a_number() {
        let err = draft(QuestionKindDraft::Open {
            answer: "twelve".into(),
            answer_type: OpenAnswerType::Number,
        })
        .validate()
        .unwrap_err();
        assert!(matches!(err, QuestionError::InvalidNumber(_)));
    }

    #[test]
    fn open_number_draft_rejects_nan_and_infinity() {
        for raw in ["NaN", "inf", "-Infinity", "1e400"] {
            let err = draft(QuestionKindDraft::Open {
                answer: raw.into(),
                answer_type: OpenAnswerType::Number,
            })
            .validate()
            .unwrap_err();
            assert_eq!(err, QuestionError::InvalidNumber(raw.into()));
        }
    }

    #[test]
    fn draft_deserializes_from_tagged_json() {
        let json = r#"{
            "content": "Is water wet?",
            "type": "true_false",
            "correct": true
        }"#;
        let parsed: QuestionDraft = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.kind, QuestionKindDraft::TrueFalse { correct: true });
    }
}

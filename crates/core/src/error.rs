use thiserror::Error;

use crate::model::{
    CategoryError, ContactError, GuessError, ProgressError, QuestionError, QuizError,
    SittingError, UserError,
};

/// Any validation failure raised by the domain model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Guess(#[from] GuessError),
    #[error(transparent)]
    Sitting(#[from] SittingError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Contact(#[from] ContactError),
}

//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{
    CategoryError, ContactError, GuessError, QuestionError, QuizError, SittingError, UserError,
};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `UserService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UserServiceError {
    #[error("a user with this email address already exists")]
    DuplicateEmail,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("this account is inactive")]
    Inactive,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("password hashing failed: {0}")]
    Hashing(#[from] tokio::task::JoinError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `CategoryService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CategoryServiceError {
    #[error("category `{0}` already exists")]
    DuplicateName(String),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuizService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizServiceError {
    #[error("permission denied")]
    PermissionDenied,
    #[error("a quiz with url `{0}` already exists")]
    DuplicateSlug(String),
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Category(#[from] CategoryError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `QuestionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuestionServiceError {
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SittingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SittingServiceError {
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Sitting(#[from] SittingError),
    #[error(transparent)]
    Guess(#[from] GuessError),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for SittingServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Sitting(e) => Self::Sitting(e),
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `MarkingService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MarkingServiceError {
    #[error("permission denied")]
    PermissionDenied,
    #[error(transparent)]
    Sitting(#[from] SittingError),
    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for MarkingServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Sitting(e) => Self::Sitting(e),
            other => Self::Storage(other),
        }
    }
}

/// Errors emitted by `ContactService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContactServiceError {
    #[error(transparent)]
    Contact(#[from] ContactError),
    #[error("message could not be delivered: {0}")]
    Delivery(String),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

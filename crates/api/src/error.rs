//! Maps service errors onto HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use quiz_core::model::SittingError;
use services::{
    CategoryServiceError, ContactServiceError, MarkingServiceError, ProgressServiceError,
    QuestionServiceError, QuizServiceError, SittingServiceError, UserServiceError,
};
use storage::repository::StorageError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("permission denied")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn bad_request(err: impl std::fmt::Display) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(%detail, "request failed");
        }
        let body = Json(json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound => ApiError::NotFound,
            StorageError::Conflict => ApiError::Conflict("already exists".into()),
            StorageError::Sitting(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SittingError> for ApiError {
    fn from(err: SittingError) -> Self {
        match err {
            SittingError::UnknownOrder(_) | SittingError::UnknownMode(_) => ApiError::NotFound,
            SittingError::AlreadyAnswered(_)
            | SittingError::Completed
            | SittingError::NotComplete => ApiError::Conflict(err.to_string()),
            SittingError::NoQuestions => ApiError::bad_request(err),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::DuplicateEmail => ApiError::Conflict(err.to_string()),
            UserServiceError::InvalidCredentials | UserServiceError::InvalidToken => {
                ApiError::Unauthorized
            }
            UserServiceError::Inactive => ApiError::Forbidden,
            UserServiceError::User(e) => ApiError::bad_request(e),
            UserServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CategoryServiceError> for ApiError {
    fn from(err: CategoryServiceError) -> Self {
        match err {
            CategoryServiceError::DuplicateName(_) => ApiError::Conflict(err.to_string()),
            CategoryServiceError::Category(e) => ApiError::bad_request(e),
            CategoryServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<QuizServiceError> for ApiError {
    fn from(err: QuizServiceError) -> Self {
        match err {
            QuizServiceError::PermissionDenied => ApiError::Forbidden,
            QuizServiceError::DuplicateSlug(_) => ApiError::Conflict(err.to_string()),
            QuizServiceError::Quiz(e) => ApiError::bad_request(e),
            QuizServiceError::Category(e) => ApiError::bad_request(e),
            QuizServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<QuestionServiceError> for ApiError {
    fn from(err: QuestionServiceError) -> Self {
        match err {
            QuestionServiceError::Question(e) => ApiError::bad_request(e),
            QuestionServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SittingServiceError> for ApiError {
    fn from(err: SittingServiceError) -> Self {
        match err {
            SittingServiceError::PermissionDenied => ApiError::Forbidden,
            SittingServiceError::Sitting(e) => e.into(),
            SittingServiceError::Guess(e) => ApiError::bad_request(e),
            SittingServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ProgressServiceError> for ApiError {
    fn from(err: ProgressServiceError) -> Self {
        match err {
            ProgressServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<MarkingServiceError> for ApiError {
    fn from(err: MarkingServiceError) -> Self {
        match err {
            MarkingServiceError::PermissionDenied => ApiError::Forbidden,
            MarkingServiceError::Sitting(e) => e.into(),
            MarkingServiceError::Storage(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ContactServiceError> for ApiError {
    fn from(err: ContactServiceError) -> Self {
        match err {
            ContactServiceError::Contact(e) => ApiError::bad_request(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use quiz_core::model::{Category, Quiz, SittingMode};
use services::{ProgressReport, StartOutcome};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct TakeParams {
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuizDetailResponse {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub question_count: usize,
}

/// Quiz, category and progress routes. Every one of them needs a logged-in caller.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/quizzes", get(list_quizzes))
        .route("/quizzes/{slug}", get(quiz_detail))
        .route("/quizzes/{slug}/take", post(take))
        .route("/categories", get(list_categories))
        .route("/categories/{name}/quizzes", get(category_quizzes))
        .route("/progress", get(progress))
}

async fn list_quizzes(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<Vec<Quiz>>, ApiError> {
    Ok(Json(state.services.quizzes().list_quizzes().await?))
}

async fn quiz_detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<QuizDetailResponse>, ApiError> {
    let quizzes = state.services.quizzes();
    let quiz = quizzes.quiz_detail(&slug, Some(&current.user)).await?;
    let question_count = quizzes.max_score(quiz.id()).await?;
    Ok(Json(QuizDetailResponse {
        quiz,
        question_count,
    }))
}

/// Start or resume a sitting. A finished single-attempt quiz answers 409.
async fn take(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(slug): Path<String>,
    Query(params): Query<TakeParams>,
) -> Result<(StatusCode, Json<StartOutcome>), ApiError> {
    let mode = match params.mode.as_deref() {
        Some(raw) => SittingMode::parse(raw)?,
        None => SittingMode::default(),
    };
    let outcome = state
        .services
        .sittings()
        .start(&current.user, &slug, mode)
        .await?;
    let status = match outcome {
        StartOutcome::Started { .. } => StatusCode::CREATED,
        StartOutcome::AlreadyCompleted { .. } => StatusCode::CONFLICT,
    };
    Ok((status, Json(outcome)))
}

async fn list_categories(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.services.categories().list_categories().await?))
}

async fn category_quizzes(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(name): Path<String>,
) -> Result<Json<Vec<Quiz>>, ApiError> {
    Ok(Json(state.services.quizzes().list_by_category(&name).await?))
}

async fn progress(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<ProgressReport>, ApiError> {
    Ok(Json(
        state.services.progress().progress(current.user.id()).await?,
    ))
}

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};

use quiz_core::model::{Guess, SittingId};
use services::{AnswerOutcome, ExplanationView, QuestionView, SittingResult, SittingSummary};

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sittings", get(list))
        .route("/sittings/{id}", get(results).delete(remove))
        .route("/sittings/{id}/finish", post(finish))
        .route(
            "/sittings/{id}/questions/{order}",
            get(question).post(answer),
        )
        .route(
            "/sittings/{id}/questions/{order}/explanation",
            get(explanation),
        )
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<SittingSummary>>, ApiError> {
    Ok(Json(
        state.services.sittings().list_sittings(&current.user).await?,
    ))
}

async fn results(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<SittingId>,
) -> Result<Json<SittingResult>, ApiError> {
    Ok(Json(
        state.services.sittings().results(&current.user, id).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<SittingId>,
) -> Result<StatusCode, ApiError> {
    state.services.sittings().delete(&current.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn finish(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<SittingId>,
) -> Result<Json<SittingResult>, ApiError> {
    Ok(Json(
        state.services.sittings().finish(&current.user, id).await?,
    ))
}

async fn question(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((id, order)): Path<(SittingId, u32)>,
) -> Result<Json<QuestionView>, ApiError> {
    let view = state
        .services
        .sittings()
        .question_view(&current.user, id, order)
        .await?;
    Ok(Json(view))
}

async fn answer(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((id, order)): Path<(SittingId, u32)>,
    Json(guess): Json<Guess>,
) -> Result<Json<AnswerOutcome>, ApiError> {
    let outcome = state
        .services
        .sittings()
        .submit_answer(&current.user, id, order, guess)
        .await?;
    Ok(Json(outcome))
}

async fn explanation(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((id, order)): Path<(SittingId, u32)>,
) -> Result<Json<ExplanationView>, ApiError> {
    let view = state
        .services
        .sittings()
        .explanation(&current.user, id, order)
        .await?;
    Ok(Json(view))
}

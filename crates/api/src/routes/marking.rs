use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use quiz_core::model::SittingId;
use services::{MarkingDetail, MarkingListItem, ToggleOutcome};
use storage::repository::SittingFilter;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct MarkingQuery {
    pub quiz_filter: Option<String>,
    pub user_filter: Option<String>,
}

impl MarkingQuery {
    fn into_filter(self) -> SittingFilter {
        let non_empty = |value: Option<String>| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        SittingFilter {
            quiz_title_contains: non_empty(self.quiz_filter),
            user_contains: non_empty(self.user_filter),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub order: u32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/marking", get(list))
        .route("/marking/{id}", get(detail))
        .route("/marking/{id}/toggle", post(toggle))
}

async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<MarkingQuery>,
) -> Result<Json<Vec<MarkingListItem>>, ApiError> {
    let items = state
        .services
        .marking()
        .list(&current.user, &query.into_filter())
        .await?;
    Ok(Json(items))
}

async fn detail(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<SittingId>,
) -> Result<Json<MarkingDetail>, ApiError> {
    Ok(Json(
        state.services.marking().detail(&current.user, id).await?,
    ))
}

async fn toggle(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<SittingId>,
    Json(body): Json<ToggleRequest>,
) -> Result<Json<ToggleOutcome>, ApiError> {
    let outcome = state
        .services
        .marking()
        .toggle(&current.user, id, body.order)
        .await?;
    Ok(Json(outcome))
}

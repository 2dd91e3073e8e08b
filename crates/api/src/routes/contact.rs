use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};

use quiz_core::model::ContactMessage;

use crate::error::ApiError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/contact", post(send))
}

async fn send(
    State(state): State<AppState>,
    Json(message): Json<ContactMessage>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let sent = state.services.contact().send(message).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "status": "sent", "subject": sent.mail_subject() })),
    ))
}

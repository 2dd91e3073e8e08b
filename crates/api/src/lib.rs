//! HTTP surface of the quiz site.
//!
//! JSON in, JSON out. Authentication is a bearer token obtained from
//! `POST /api/users/login`; see [`auth::CurrentUser`].

#![forbid(unsafe_code)]

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::api())
        .route("/health", get(health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod contact;
pub mod marking;
pub mod quizzes;
pub mod sittings;
pub mod users;

/// Everything mounted under `/api`.
pub fn api() -> Router<AppState> {
    Router::new()
        .merge(users::routes())
        .merge(quizzes::routes())
        .merge(sittings::routes())
        .merge(marking::routes())
        .merge(contact::routes())
        .merge(admin::routes())
}

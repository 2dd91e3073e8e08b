//! Editor endpoints. Every handler requires `can_edit_quizzes`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;

use quiz_core::model::{
    Category, CategoryId, Question, QuestionDraft, QuestionId, Quiz, QuizDraft, QuizId,
    SubCategory,
};
use services::QuizExport;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewCategoryRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct NewSubCategoryRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct QuizQuestionsRequest {
    pub question_ids: Vec<QuestionId>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/categories", post(create_category))
        .route(
            "/admin/categories/{id}/subcategories",
            post(create_sub_category),
        )
        .route("/admin/quizzes", post(create_quiz))
        .route("/admin/quizzes/{id}", put(update_quiz))
        .route("/admin/quizzes/{id}/questions", put(set_questions))
        .route("/admin/quizzes/{id}/export", get(export_quiz))
        .route("/admin/questions", post(create_question))
        .route("/admin/questions/{id}", put(update_question))
}

async fn create_category(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(body): Json<NewCategoryRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    current.require_editor()?;
    let category = state
        .services
        .categories()
        .create_category(&body.name, &body.description)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn create_sub_category(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<CategoryId>,
    Json(body): Json<NewSubCategoryRequest>,
) -> Result<(StatusCode, Json<SubCategory>), ApiError> {
    current.require_editor()?;
    let sub = state
        .services
        .categories()
        .create_sub_category(id, &body.name)
        .await?;
    Ok((StatusCode::CREATED, Json(sub)))
}

async fn create_quiz(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(draft): Json<QuizDraft>,
) -> Result<(StatusCode, Json<Quiz>), ApiError> {
    current.require_editor()?;
    let quiz = state.services.quizzes().create_quiz(draft).await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

async fn update_quiz(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<QuizId>,
    Json(draft): Json<QuizDraft>,
) -> Result<Json<Quiz>, ApiError> {
    current.require_editor()?;
    Ok(Json(state.services.quizzes().update_quiz(id, draft).await?))
}

async fn set_questions(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<QuizId>,
    Json(body): Json<QuizQuestionsRequest>,
) -> Result<StatusCode, ApiError> {
    current.require_editor()?;
    state
        .services
        .quizzes()
        .set_questions(id, &body.question_ids)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn export_quiz(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<QuizId>,
) -> Result<Json<QuizExport>, ApiError> {
    current.require_editor()?;
    Ok(Json(state.services.quizzes().export(id).await?))
}

async fn create_question(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(draft): Json<QuestionDraft>,
) -> Result<(StatusCode, Json<Question>), ApiError> {
    current.require_editor()?;
    let question = state.services.questions().create_question(draft).await?;
    Ok((StatusCode::CREATED, Json(question)))
}

async fn update_question(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<QuestionId>,
    Json(draft): Json<QuestionDraft>,
) -> Result<Json<Question>, ApiError> {
    current.require_editor()?;
    Ok(Json(
        state
            .services
            .questions()
            .update_question(id, draft)
            .await?,
    ))
}

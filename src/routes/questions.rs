use axum::{Json, Router, extract::State, routing::post};

use crate::{dto::questions::ReloadResponse, error::AppError, state::SharedState};

/// Question bank maintenance routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/questions/reload", post(reload_questions))
}

/// Reload the question bank from disk; the current bank stays on failure.
#[utoipa::path(
    post,
    path = "/questions/reload",
    tag = "questions",
    responses(
        (status = 200, description = "Bank reloaded", body = ReloadResponse),
        (status = 503, description = "Bank unreadable; previous bank kept")
    )
)]
pub async fn reload_questions(
    State(state): State<SharedState>,
) -> Result<Json<ReloadResponse>, AppError> {
    let count = state.quiz().reload_questions().await?;
    Ok(Json(ReloadResponse { count }))
}

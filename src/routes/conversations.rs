use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{chat::CommandRequest, session::SessionView},
    error::AppError,
    services::quiz_service::CommandOutcome,
    state::{SharedState, session::ConversationId},
};

/// Routes receiving chat updates and exposing running quizzes.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/conversations/{conversation_id}/commands",
            post(submit_command),
        )
        .route("/conversations/{conversation_id}/session", get(get_session))
}

/// Run a chat command (`/start`, `answer:<option>`, `/cancel`, ...) in a conversation.
#[utoipa::path(
    post,
    path = "/conversations/{conversation_id}/commands",
    tag = "conversations",
    params(("conversation_id" = i64, Path, description = "Chat conversation identifier")),
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Command handled", body = CommandOutcome),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn submit_command(
    State(state): State<SharedState>,
    Path(conversation_id): Path<ConversationId>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<CommandOutcome>, AppError> {
    payload.validate()?;
    let outcome = state
        .quiz()
        .dispatch(
            conversation_id,
            payload.player(),
            &payload.text,
            payload.question_id,
        )
        .await?;
    Ok(Json(outcome))
}

/// Inspect the quiz running in a conversation.
#[utoipa::path(
    get,
    path = "/conversations/{conversation_id}/session",
    tag = "conversations",
    params(("conversation_id" = i64, Path, description = "Chat conversation identifier")),
    responses(
        (status = 200, description = "Running quiz", body = SessionView),
        (status = 404, description = "No quiz running")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(conversation_id): Path<ConversationId>,
) -> Result<Json<SessionView>, AppError> {
    let snapshot = state.engine().snapshot(conversation_id).await.ok_or_else(|| {
        AppError::NotFound(format!("no quiz running in conversation {conversation_id}"))
    })?;
    Ok(Json(snapshot.into()))
}

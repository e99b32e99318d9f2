use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::Sse,
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    services::sse_service,
    state::{SharedState, session::ConversationId},
};

#[utoipa::path(
    get,
    path = "/conversations/{conversation_id}/events",
    tag = "sse",
    params(("conversation_id" = i64, Path, description = "Chat conversation identifier")),
    responses((
        status = 200,
        description = "Outbound messages of the conversation (`question`, `text`, `edit`)",
        content_type = "text/event-stream",
        body = String
    ))
)]
/// Stream the messages the quiz sends to a conversation.
pub async fn conversation_stream(
    State(state): State<SharedState>,
    Path(conversation_id): Path<ConversationId>,
) -> Sse<impl Stream<Item = Result<axum::response::sse::Event, Infallible>>> {
    let receiver = sse_service::subscribe_conversation(state.bridge(), conversation_id);
    info!(conversation_id, "New conversation SSE connection");
    sse_service::to_sse_stream(receiver, state.bridge().clone(), conversation_id)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route(
        "/conversations/{conversation_id}/events",
        get(conversation_stream),
    )
}

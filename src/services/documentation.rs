use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Chat Quiz Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::conversation_stream,
        crate::routes::conversations::submit_command,
        crate::routes::conversations::get_session,
        crate::routes::leaderboard::get_leaderboard,
        crate::routes::questions::reload_questions,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::chat::CommandRequest,
            crate::dto::session::SessionView,
            crate::dto::leaderboard::LeaderboardResponse,
            crate::dto::leaderboard::LeaderboardEntryView,
            crate::dto::questions::ReloadResponse,
            crate::dto::sse::Handshake,
            crate::dto::sse::QuestionMessageEvent,
            crate::dto::sse::TextMessageEvent,
            crate::dto::sse::EditMessageEvent,
            crate::services::quiz_service::CommandOutcome,
            crate::state::question::PresentedQuestion,
            crate::state::state_machine::SessionPhase,
            crate::state::leaderboard::ScoringMode,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "conversations", description = "Chat commands and running quizzes"),
        (name = "leaderboard", description = "Player ranking"),
        (name = "questions", description = "Question bank maintenance"),
    )
)]
pub struct ApiDoc;

use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Conversations with a running quiz.
    pub active_sessions: usize,
    /// Questions in the loaded bank.
    pub question_bank_size: usize,
    /// Conversations with a connected event stream.
    pub connected_streams: usize,
}

impl HealthResponse {
    /// Health response; `degraded` when the leaderboard cannot be persisted.
    pub fn new(
        degraded: bool,
        active_sessions: usize,
        question_bank_size: usize,
        connected_streams: usize,
    ) -> Self {
        Self {
            status: if degraded { "degraded" } else { "ok" }.to_string(),
            active_sessions,
            question_bank_size,
            connected_streams,
        }
    }
}

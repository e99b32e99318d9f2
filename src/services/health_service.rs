use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Report liveness, flagging a leaderboard that can no longer be persisted.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let engine = state.engine();
    let degraded = !engine.leaderboard().is_healthy();
    if degraded {
        warn!("leaderboard storage unhealthy (degraded mode)");
    }

    HealthResponse::new(
        degraded,
        engine.sessions().active_sessions(),
        engine.question_bank_size().await,
        state.bridge().connected_conversations(),
    )
}

use axum::Router;

use crate::state::SharedState;

pub mod conversations;
pub mod docs;
pub mod health;
pub mod leaderboard;
pub mod questions;
pub mod sse;

/// Compose the API routes and Swagger UI over the shared state.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(conversations::router())
        .merge(leaderboard::router())
        .merge(questions::router())
        .merge(docs::router());

    api_router.with_state(state)
}

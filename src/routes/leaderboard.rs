use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use validator::Validate;

use crate::{
    dto::leaderboard::{LeaderboardQuery, LeaderboardResponse},
    error::AppError,
    state::SharedState,
};

/// Read-only leaderboard routes.
pub fn router() -> Router<SharedState> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

/// Return the best players, ranked.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "leaderboard",
    params(LeaderboardQuery),
    responses(
        (status = 200, description = "Ranked players", body = LeaderboardResponse),
        (status = 400, description = "Invalid limit")
    )
)]
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    query.validate()?;
    let limit = query.limit.unwrap_or(state.quiz().leaderboard_size());
    let entries = state.quiz().top(limit).await;

    Ok(Json(LeaderboardResponse {
        scoring_mode: state.engine().leaderboard().mode(),
        entries: entries.into_iter().map(Into::into).collect(),
    }))
}

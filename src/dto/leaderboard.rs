use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::state::{
    leaderboard::{RankedEntry, ScoringMode},
    session::PlayerId,
};

/// Query of the leaderboard route.
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaderboardQuery {
    /// Entries to return; defaults to the configured leaderboard size.
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

/// One ranked player.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntryView {
    pub rank: usize,
    pub player_id: PlayerId,
    pub display_name: String,
    pub best_score: u32,
    pub total_score: u64,
    pub games_played: u32,
}

impl From<RankedEntry> for LeaderboardEntryView {
    fn from(ranked: RankedEntry) -> Self {
        Self {
            rank: ranked.rank,
            player_id: ranked.entry.player_id,
            display_name: ranked.entry.display_name,
            best_score: ranked.entry.best_score,
            total_score: ranked.entry.total_score,
            games_played: ranked.entry.games_played,
        }
    }
}

/// Top of the leaderboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Score the ranking is based on.
    pub scoring_mode: ScoringMode,
    pub entries: Vec<LeaderboardEntryView>,
}

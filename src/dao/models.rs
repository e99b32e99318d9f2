use serde::{Deserialize, Serialize};

/// Current layout version of the persisted leaderboard.
pub const LEADERBOARD_DOCUMENT_VERSION: u32 = 1;

/// Whole leaderboard as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardDocument {
    /// Layout version, see [`LEADERBOARD_DOCUMENT_VERSION`].
    #[serde(default = "default_version")]
    pub version: u32,
    /// Entries in insertion order; the order breaks ranking ties.
    #[serde(default)]
    pub entries: Vec<LeaderboardEntryEntity>,
}

impl LeaderboardDocument {
    /// Wrap entries into a document of the current version.
    pub fn new(entries: Vec<LeaderboardEntryEntity>) -> Self {
        Self {
            version: LEADERBOARD_DOCUMENT_VERSION,
            entries,
        }
    }
}

fn default_version() -> u32 {
    LEADERBOARD_DOCUMENT_VERSION
}

/// Durable record of one player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LeaderboardEntryEntity {
    /// Stable player identifier.
    pub player_id: i64,
    /// Latest name seen for the player.
    pub display_name: String,
    /// Highest score of a single game.
    pub best_score: u32,
    /// Sum of every completed game.
    #[serde(default)]
    pub total_score: u64,
    /// Completed games.
    pub games_played: u32,
}

/// Question as written in a question bank file.
///
/// Accepts both `options` and the older `answer_options` key, and names the
/// correct answer by its text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Optional explicit identifier; defaults to the 1-based position.
    #[serde(default)]
    pub id: Option<u32>,
    /// Prompt text.
    pub question: String,
    /// Answer options.
    #[serde(alias = "answer_options")]
    pub options: Vec<String>,
    /// Text of the correct option.
    pub correct_answer: String,
}

//! Ranked, persistent player scores.
//!
//! Ranking ties are broken by insertion order: the player who reached the
//! leaderboard first ranks first among equal scores.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    dao::{
        leaderboard_store::LeaderboardRepository, models::LeaderboardEntryEntity,
        storage::StorageResult,
    },
    state::session::PlayerId,
};

/// Which score orders the leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Best single game.
    #[default]
    Best,
    /// Sum of every completed game.
    Cumulative,
}

/// Standing of one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Stable player identifier.
    pub player_id: PlayerId,
    /// Latest name seen for the player.
    pub display_name: String,
    /// Highest score of a single game; never decreases.
    pub best_score: u32,
    /// Sum of every completed game.
    pub total_score: u64,
    /// Completed games.
    pub games_played: u32,
}

impl LeaderboardEntry {
    fn first(player_id: PlayerId, display_name: &str, score: u32) -> Self {
        Self {
            player_id,
            display_name: display_name.to_string(),
            best_score: score,
            total_score: u64::from(score),
            games_played: 1,
        }
    }

    fn record(&mut self, display_name: &str, score: u32) {
        self.display_name = display_name.to_string();
        self.best_score = self.best_score.max(score);
        self.total_score += u64::from(score);
        self.games_played += 1;
    }

    fn fold(&mut self, other: LeaderboardEntry) {
        self.display_name = other.display_name;
        self.best_score = self.best_score.max(other.best_score);
        self.total_score += other.total_score;
        self.games_played += other.games_played;
    }

    /// Score used for ordering under `mode`.
    pub fn ranking_score(&self, mode: ScoringMode) -> u64 {
        match mode {
            ScoringMode::Best => u64::from(self.best_score),
            ScoringMode::Cumulative => self.total_score,
        }
    }
}

impl From<LeaderboardEntryEntity> for LeaderboardEntry {
    fn from(value: LeaderboardEntryEntity) -> Self {
        Self {
            player_id: value.player_id,
            display_name: value.display_name,
            best_score: value.best_score,
            total_score: value.total_score,
            games_played: value.games_played,
        }
    }
}

impl From<LeaderboardEntry> for LeaderboardEntryEntity {
    fn from(value: LeaderboardEntry) -> Self {
        Self {
            player_id: value.player_id,
            display_name: value.display_name,
            best_score: value.best_score,
            total_score: value.total_score,
            games_played: value.games_played,
        }
    }
}

/// Entry with its 1-based rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedEntry {
    /// Position on the leaderboard, starting at 1.
    pub rank: usize,
    /// The player's standing.
    pub entry: LeaderboardEntry,
}

/// In-memory leaderboard mirrored to a [`LeaderboardRepository`].
///
/// Merges are serialized by the store lock and applied to memory only after
/// the repository accepted the new document. While the stored leaderboard
/// could not be read, nothing is written over it.
pub struct LeaderboardStore {
    repository: Arc<dyn LeaderboardRepository>,
    entries: Mutex<IndexMap<PlayerId, LeaderboardEntry>>,
    mode: ScoringMode,
    healthy: AtomicBool,
    // only touched under the `entries` lock
    loaded: AtomicBool,
}

impl LeaderboardStore {
    /// Load the stored leaderboard.
    ///
    /// A corrupt document starts an empty leaderboard. Unreachable storage
    /// also starts empty, but merges are refused until a later load succeeds.
    pub async fn open(repository: Arc<dyn LeaderboardRepository>, mode: ScoringMode) -> Self {
        let (entries, loaded, healthy) = match repository.load().await {
            Ok(entities) => (index_entries(entities), true, true),
            Err(err) if err.is_corrupt() => {
                warn!(error = %err, "leaderboard corrupt; starting with an empty leaderboard");
                (IndexMap::new(), true, false)
            }
            Err(err) => {
                warn!(error = %err, "leaderboard unreadable; merges wait for storage");
                (IndexMap::new(), false, false)
            }
        };

        debug!(count = entries.len(), mode = ?mode, "leaderboard opened");

        Self {
            repository,
            entries: Mutex::new(entries),
            mode,
            healthy: AtomicBool::new(healthy),
            loaded: AtomicBool::new(loaded),
        }
    }

    /// Ordering used by [`LeaderboardStore::top`].
    pub fn mode(&self) -> ScoringMode {
        self.mode
    }

    /// Whether the last load or save succeeded.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    /// Fold a completed game into the player's entry and persist the result.
    ///
    /// On a storage failure nothing changes, in memory or on disk.
    pub async fn merge(
        &self,
        player_id: PlayerId,
        display_name: &str,
        score: u32,
    ) -> StorageResult<LeaderboardEntry> {
        let mut entries = self.entries.lock().await;
        self.ensure_loaded(&mut entries).await?;

        let mut next = entries.clone();
        let merged = next
            .entry(player_id)
            .and_modify(|entry| entry.record(display_name, score))
            .or_insert_with(|| LeaderboardEntry::first(player_id, display_name, score))
            .clone();

        let document = next.values().cloned().map(Into::into).collect();
        if let Err(err) = self.repository.save(document).await {
            self.healthy.store(false, Ordering::SeqCst);
            return Err(err);
        }

        self.healthy.store(true, Ordering::SeqCst);
        *entries = next;
        debug!(
            player_id,
            score,
            best_score = merged.best_score,
            games_played = merged.games_played,
            "leaderboard entry merged"
        );
        Ok(merged)
    }

    /// Retry the initial load before anything is written over stored data.
    async fn ensure_loaded(
        &self,
        entries: &mut IndexMap<PlayerId, LeaderboardEntry>,
    ) -> StorageResult<()> {
        if self.loaded.load(Ordering::SeqCst) {
            return Ok(());
        }

        match self.repository.load().await {
            Ok(entities) => {
                *entries = index_entries(entities);
                info!(count = entries.len(), "leaderboard loaded after an earlier failure");
            }
            Err(err) if err.is_corrupt() => {
                warn!(error = %err, "leaderboard corrupt; continuing with an empty leaderboard");
                entries.clear();
            }
            Err(err) => {
                self.healthy.store(false, Ordering::SeqCst);
                warn!(error = %err, "leaderboard still unreadable; merge refused");
                return Err(err);
            }
        }
        self.loaded.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// The `n` best entries.
    pub async fn top(&self, n: usize) -> Vec<RankedEntry> {
        let entries = self.entries.lock().await;
        let mut ranked = rank(&entries, self.mode);
        ranked.truncate(n);
        ranked
    }

    /// 1-based rank of a player.
    pub async fn rank_of(&self, player_id: PlayerId) -> Option<usize> {
        let entries = self.entries.lock().await;
        rank(&entries, self.mode)
            .into_iter()
            .find(|ranked| ranked.entry.player_id == player_id)
            .map(|ranked| ranked.rank)
    }

    /// Entry of a player.
    pub async fn entry(&self, player_id: PlayerId) -> Option<LeaderboardEntry> {
        self.entries.lock().await.get(&player_id).cloned()
    }

    /// Number of players on the leaderboard.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Whether no game was ever committed.
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

fn index_entries(entities: Vec<LeaderboardEntryEntity>) -> IndexMap<PlayerId, LeaderboardEntry> {
    let mut entries: IndexMap<PlayerId, LeaderboardEntry> = IndexMap::new();
    for entry in entities.into_iter().map(LeaderboardEntry::from) {
        match entries.get_mut(&entry.player_id) {
            Some(existing) => {
                warn!(
                    player_id = entry.player_id,
                    "duplicate leaderboard entry folded into the first one"
                );
                existing.fold(entry);
            }
            None => {
                entries.insert(entry.player_id, entry);
            }
        }
    }
    entries
}

fn rank(entries: &IndexMap<PlayerId, LeaderboardEntry>, mode: ScoringMode) -> Vec<RankedEntry> {
    let mut sorted: Vec<&LeaderboardEntry> = entries.values().collect();
    // stable sort: insertion order survives among equal scores
    sorted.sort_by(|a, b| b.ranking_score(mode).cmp(&a.ranking_score(mode)));
    sorted
        .into_iter()
        .enumerate()
        .map(|(index, entry)| RankedEntry {
            rank: index + 1,
            entry: entry.clone(),
        })
        .collect()
}

mod json_file;
mod memory;

pub use json_file::JsonFileLeaderboard;
pub use memory::InMemoryLeaderboard;

use crate::dao::models::LeaderboardEntryEntity;
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;

/// Abstraction over the persistence layer for the leaderboard.
///
/// `save` replaces the whole stored leaderboard; a failed save must leave the
/// previously stored one readable.
pub trait LeaderboardRepository: Send + Sync {
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>>;
    fn save(&self, entries: Vec<LeaderboardEntryEntity>) -> BoxFuture<'static, StorageResult<()>>;
}

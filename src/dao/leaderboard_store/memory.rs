use std::{
    io,
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use futures::future::{self, BoxFuture};

use crate::dao::{
    leaderboard_store::LeaderboardRepository,
    models::LeaderboardEntryEntity,
    storage::{StorageError, StorageResult},
};

/// Leaderboard kept in process memory; used when no file is configured.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaderboard {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<Vec<LeaderboardEntryEntity>>,
    fail_loads: AtomicBool,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl InMemoryLeaderboard {
    /// Empty leaderboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaderboard preloaded with `entries`.
    pub fn with_entries(entries: Vec<LeaderboardEntryEntity>) -> Self {
        let store = Self::default();
        *store.lock() = entries;
        store
    }

    /// Make subsequent loads fail as if the backend were unreachable.
    pub fn fail_loads(&self, fail: bool) {
        self.inner.fail_loads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves fail (or succeed again).
    pub fn fail_saves(&self, fail: bool) {
        self.inner.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    /// Copy of the stored entries.
    pub fn entries(&self) -> Vec<LeaderboardEntryEntity> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<LeaderboardEntryEntity>> {
        self.inner
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl LeaderboardRepository for InMemoryLeaderboard {
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let result = if self.inner.fail_loads.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "in-memory leaderboard rejected the load".into(),
                io::Error::other("load disabled"),
            ))
        } else {
            Ok(self.entries())
        };
        Box::pin(future::ready(result))
    }

    fn save(&self, entries: Vec<LeaderboardEntryEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let result = if self.inner.fail_saves.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "in-memory leaderboard rejected the save".into(),
                io::Error::other("save disabled"),
            ))
        } else {
            *self.lock() = entries;
            self.inner.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        };
        Box::pin(future::ready(result))
    }
}

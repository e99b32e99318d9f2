use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::{FutureExt, future::BoxFuture};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

use crate::dao::{
    leaderboard_store::LeaderboardRepository,
    models::{LeaderboardDocument, LeaderboardEntryEntity},
    storage::{StorageError, StorageResult},
};

/// Leaderboard stored as one JSON document, replaced atomically on every save.
#[derive(Debug, Clone)]
pub struct JsonFileLeaderboard {
    path: Arc<Path>,
}

impl JsonFileLeaderboard {
    /// Store backed by the file at `path`; the file does not need to exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path: PathBuf = path.into();
        Self {
            path: Arc::from(path),
        }
    }

    /// Location of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LeaderboardRepository for JsonFileLeaderboard {
    fn load(&self) -> BoxFuture<'static, StorageResult<Vec<LeaderboardEntryEntity>>> {
        let path = self.path.clone();
        async move { read_document(&path).await }.boxed()
    }

    fn save(&self, entries: Vec<LeaderboardEntryEntity>) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.path.clone();
        async move { write_document(&path, entries).await }.boxed()
    }
}

async fn read_document(path: &Path) -> StorageResult<Vec<LeaderboardEntryEntity>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "leaderboard file not found; starting empty");
            return Ok(Vec::new());
        }
        Err(err) => {
            return Err(StorageError::unavailable(
                format!("failed to read `{}`", path.display()),
                err,
            ));
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match serde_json::from_slice::<LeaderboardDocument>(&bytes) {
        Ok(document) => Ok(document.entries),
        Err(source) => {
            quarantine(path).await;
            Err(StorageError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

async fn write_document(path: &Path, entries: Vec<LeaderboardEntryEntity>) -> StorageResult<()> {
    let bytes = serde_json::to_vec_pretty(&LeaderboardDocument::new(entries)).map_err(|err| {
        StorageError::unavailable("failed to encode leaderboard".into(), err)
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|err| {
            StorageError::unavailable(format!("failed to create `{}`", parent.display()), err)
        })?;
    }

    let tmp = sibling(path, ".tmp");
    let written = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp, path).await
    }
    .await;

    if let Err(err) = written {
        let _ = fs::remove_file(&tmp).await;
        return Err(StorageError::unavailable(
            format!("failed to replace `{}`", path.display()),
            err,
        ));
    }

    Ok(())
}

/// Move an unreadable document aside so the next save does not destroy it.
async fn quarantine(path: &Path) {
    let target = sibling(path, ".corrupt");
    match fs::rename(path, &target).await {
        Ok(()) => warn!(
            path = %path.display(),
            moved_to = %target.display(),
            "leaderboard file is corrupt; moved aside"
        ),
        Err(err) => warn!(
            path = %path.display(),
            error = %err,
            "leaderboard file is corrupt and could not be moved aside"
        ),
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| OsString::from("leaderboard"));
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(player_id: i64, best_score: u32) -> LeaderboardEntryEntity {
        LeaderboardEntryEntity {
            player_id,
            display_name: format!("player-{player_id}"),
            best_score,
            total_score: u64::from(best_score),
            games_played: 1,
        }
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLeaderboard::new(dir.path().join("scores.json"));
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blank_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        std::fs::write(&path, "  \n").unwrap();

        let store = JsonFileLeaderboard::new(&path);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_entry_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileLeaderboard::new(dir.path().join("nested").join("scores.json"));
        let entries = vec![entity(3, 10), entity(1, 40), entity(2, 10)];

        store.save(entries.clone()).await.unwrap();
        assert_eq!(store.load().await.unwrap(), entries);
        assert!(!sibling(store.path(), ".tmp").exists());
    }

    #[tokio::test]
    async fn failed_write_keeps_the_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        let store = JsonFileLeaderboard::new(&path);
        store.save(vec![entity(1, 30), entity(2, 20)]).await.unwrap();

        std::fs::create_dir(sibling(&path, ".tmp")).unwrap();
        let err = store.save(vec![entity(9, 10)]).await.unwrap_err();
        assert!(!err.is_corrupt());

        assert_eq!(
            store.load().await.unwrap(),
            vec![entity(1, 30), entity(2, 20)]
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_reported_and_moved_aside() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        std::fs::write(&path, "{\"version\": 1, \"entries\": [").unwrap();

        let store = JsonFileLeaderboard::new(&path);
        let err = store.load().await.unwrap_err();
        assert!(err.is_corrupt());
        assert!(!path.exists());
        assert!(dir.path().join("scores.json.corrupt").exists());

        store.save(vec![entity(1, 20)]).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![entity(1, 20)]);
    }
}

//! File-backed celebrated-match sets.
//!
//! Each viewer gets `celebrated_matches_{viewer}.json` in the ledger
//! directory, holding a JSON array of target ids. A file that fails to
//! parse is treated as empty and replaced on the next write.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use affinity_core::{celebrated_key, CelebrationLedger, Result, UserId};

/// [`CelebrationLedger`] persisted as one JSON file per viewer.
pub struct FileLedger {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Read `AFFINITY_LEDGER_DIR`, falling back to `.affinity`.
    pub fn from_env() -> Self {
        let dir = std::env::var(affinity_core::defaults::ENV_LEDGER_DIR)
            .unwrap_or_else(|_| affinity_core::defaults::LEDGER_DIR.to_string());
        Self::new(dir)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, viewer: UserId) -> PathBuf {
        self.dir.join(format!("{}.json", celebrated_key(viewer)))
    }

    async fn read_set(&self, viewer: UserId) -> Result<BTreeSet<UserId>> {
        let path = self.path_for(viewer);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(viewer_id = %viewer, "No celebrated-match file yet");
                return Ok(BTreeSet::new());
            }
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Vec<UserId>>(&raw) {
            Ok(ids) => Ok(ids.into_iter().collect()),
            Err(e) => {
                warn!(
                    viewer_id = %viewer,
                    path = %path.display(),
                    error = %e,
                    "Celebrated-match file is corrupt, treating as empty"
                );
                Ok(BTreeSet::new())
            }
        }
    }

    async fn write_set(&self, viewer: UserId, set: &BTreeSet<UserId>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(viewer);
        let tmp = path.with_extension("json.tmp");
        let ids: Vec<UserId> = set.iter().copied().collect();
        tokio::fs::write(&tmp, serde_json::to_vec(&ids)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl CelebrationLedger for FileLedger {
    async fn load(&self, viewer: UserId) -> Result<BTreeSet<UserId>> {
        self.read_set(viewer).await
    }

    async fn record(&self, viewer: UserId, target: UserId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut set = self.read_set(viewer).await?;
        if !set.insert(target) {
            return Ok(false);
        }
        self.write_set(viewer, &set).await?;
        debug!(viewer_id = %viewer, target_id = %target, "Recorded celebrated match");
        Ok(true)
    }

    async fn forget(&self, viewer: UserId, target: UserId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let mut set = self.read_set(viewer).await?;
        if !set.remove(&target) {
            return Ok(false);
        }
        self.write_set(viewer, &set).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VIEWER: UserId = UserId(5);

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path());
        assert!(ledger.load(VIEWER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_persists_json_array() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path().join("nested"));

        assert!(ledger.record(VIEWER, UserId(9)).await.unwrap());
        assert!(ledger.record(VIEWER, UserId(3)).await.unwrap());
        assert!(!ledger.record(VIEWER, UserId(9)).await.unwrap());

        let path = ledger.path_for(VIEWER);
        assert!(path.ends_with("celebrated_matches_5.json"));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, "[3,9]");
    }

    #[tokio::test]
    async fn test_survives_new_instance() {
        let dir = TempDir::new().unwrap();
        FileLedger::new(dir.path())
            .record(VIEWER, UserId(1))
            .await
            .unwrap();

        let reopened = FileLedger::new(dir.path());
        let set = reopened.load(VIEWER).await.unwrap();
        assert!(set.contains(&UserId(1)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_replaced() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path());
        std::fs::write(ledger.path_for(VIEWER), "{not json").unwrap();

        assert!(ledger.load(VIEWER).await.unwrap().is_empty());
        assert!(ledger.record(VIEWER, UserId(2)).await.unwrap());
        assert_eq!(
            std::fs::read_to_string(ledger.path_for(VIEWER)).unwrap(),
            "[2]"
        );
    }

    #[tokio::test]
    async fn test_forget() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path());
        ledger.record(VIEWER, UserId(4)).await.unwrap();
        assert!(ledger.forget(VIEWER, UserId(4)).await.unwrap());
        assert!(!ledger.forget(VIEWER, UserId(4)).await.unwrap());
        assert!(ledger.load(VIEWER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_viewers_are_independent() {
        let dir = TempDir::new().unwrap();
        let ledger = FileLedger::new(dir.path());
        ledger.record(UserId(1), UserId(2)).await.unwrap();
        assert!(ledger.load(UserId(2)).await.unwrap().is_empty());
    }
}

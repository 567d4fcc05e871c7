//! Persistence for in-flight attempt snapshots (auto-save and resume).
//!
//! A store keeps at most one snapshot per user and test. Payloads are JSON so
//! a snapshot written by one backend reads back the same from any other.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use quiz_core::model::{AttemptSnapshot, TestId, UserId};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressStoreError {
    /// The stored payload exists but cannot be decoded.
    #[error("saved progress for {test_id} is corrupt: {reason}")]
    Corrupt { test_id: TestId, reason: String },

    #[error("progress store i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("progress store unavailable: {0}")]
    Unavailable(String),
}

/// Keyed storage for one in-progress snapshot per user and test.
///
/// Snapshots of different users never see each other: every operation is
/// scoped by the owner's `UserId`.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Replace the snapshot `user_id` saved for `test_id`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError` if the snapshot cannot be written.
    async fn save(
        &self,
        user_id: UserId,
        test_id: &TestId,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), ProgressStoreError>;

    /// Load the snapshot `user_id` saved for `test_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Corrupt` if a payload exists but does not
    /// decode or names another owner; the payload is left in place for the
    /// caller to clear.
    async fn load(
        &self,
        user_id: UserId,
        test_id: &TestId,
    ) -> Result<Option<AttemptSnapshot>, ProgressStoreError>;

    /// Remove `user_id`'s snapshot for `test_id`. Clearing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError` if the backend rejects the removal.
    async fn clear(&self, user_id: UserId, test_id: &TestId) -> Result<(), ProgressStoreError>;

    /// Tests that `user_id` currently has a saved snapshot for, sorted.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError` if the backend cannot be listed.
    async fn list_saved(&self, user_id: UserId) -> Result<Vec<TestId>, ProgressStoreError>;
}

fn corrupt(test_id: &TestId, reason: impl ToString) -> ProgressStoreError {
    ProgressStoreError::Corrupt {
        test_id: test_id.clone(),
        reason: reason.to_string(),
    }
}

fn encode(
    user_id: UserId,
    test_id: &TestId,
    snapshot: &AttemptSnapshot,
) -> Result<String, ProgressStoreError> {
    if snapshot.user_id != user_id || &snapshot.test_id != test_id {
        return Err(corrupt(test_id, "snapshot does not match its key"));
    }
    serde_json::to_string(snapshot).map_err(|e| corrupt(test_id, e))
}

fn decode(user_id: UserId, test_id: &TestId, raw: &str) -> Result<AttemptSnapshot, ProgressStoreError> {
    let snapshot: AttemptSnapshot = serde_json::from_str(raw).map_err(|e| corrupt(test_id, e))?;
    if &snapshot.test_id != test_id {
        return Err(corrupt(test_id, format!("payload belongs to {}", snapshot.test_id)));
    }
    if snapshot.user_id != user_id {
        return Err(corrupt(test_id, "payload belongs to another user"));
    }
    Ok(snapshot)
}

//
// ─── IN-MEMORY ────────────────────────────────────────────────────────────────
//

/// Process-local store. Payloads are kept serialized to mirror durable stores.
#[derive(Clone, Default)]
pub struct InMemoryProgressStore {
    entries: Arc<Mutex<HashMap<(UserId, TestId), String>>>,
}

impl InMemoryProgressStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a raw payload without validation.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Unavailable` if the lock is poisoned.
    pub fn insert_raw(
        &self,
        user_id: UserId,
        test_id: &TestId,
        raw: impl Into<String>,
    ) -> Result<(), ProgressStoreError> {
        let mut guard = self.entries.lock().map_err(unavailable)?;
        guard.insert((user_id, test_id.clone()), raw.into());
        Ok(())
    }
}

fn unavailable<E: core::fmt::Display>(e: E) -> ProgressStoreError {
    ProgressStoreError::Unavailable(e.to_string())
}

#[async_trait]
impl ProgressStore for InMemoryProgressStore {
    async fn save(
        &self,
        user_id: UserId,
        test_id: &TestId,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), ProgressStoreError> {
        let raw = encode(user_id, test_id, snapshot)?;
        let mut guard = self.entries.lock().map_err(unavailable)?;
        guard.insert((user_id, test_id.clone()), raw);
        Ok(())
    }

    async fn load(
        &self,
        user_id: UserId,
        test_id: &TestId,
    ) -> Result<Option<AttemptSnapshot>, ProgressStoreError> {
        let raw = {
            let guard = self.entries.lock().map_err(unavailable)?;
            guard.get(&(user_id, test_id.clone())).cloned()
        };
        raw.map(|raw| decode(user_id, test_id, &raw)).transpose()
    }

    async fn clear(&self, user_id: UserId, test_id: &TestId) -> Result<(), ProgressStoreError> {
        let mut guard = self.entries.lock().map_err(unavailable)?;
        guard.remove(&(user_id, test_id.clone()));
        Ok(())
    }

    async fn list_saved(&self, user_id: UserId) -> Result<Vec<TestId>, ProgressStoreError> {
        let guard = self.entries.lock().map_err(unavailable)?;
        let mut ids: Vec<TestId> = guard
            .keys()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, test_id)| test_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

//
// ─── FILE ─────────────────────────────────────────────────────────────────────
//

const SNAPSHOT_EXT: &str = "json";

/// One JSON file per user and test: `<dir>/<user_id>/<test_id>.json`.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-save leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    dir: PathBuf,
}

impl FileProgressStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressStoreError::Io` if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ProgressStoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn user_dir(&self, user_id: UserId) -> PathBuf {
        self.dir.join(user_id.to_string())
    }

    fn path_for(&self, user_id: UserId, test_id: &TestId) -> PathBuf {
        // TestId is a restricted slug, safe to use as a file name.
        self.user_dir(user_id)
            .join(format!("{}.{SNAPSHOT_EXT}", test_id.as_str()))
    }

    fn tmp_path_for(&self, user_id: UserId, test_id: &TestId) -> PathBuf {
        self.user_dir(user_id)
            .join(format!(".{}.{SNAPSHOT_EXT}.tmp", test_id.as_str()))
    }
}

#[async_trait]
impl ProgressStore for FileProgressStore {
    async fn save(
        &self,
        user_id: UserId,
        test_id: &TestId,
        snapshot: &AttemptSnapshot,
    ) -> Result<(), ProgressStoreError> {
        let raw = encode(user_id, test_id, snapshot)?;
        tokio::fs::create_dir_all(self.user_dir(user_id)).await?;
        let tmp = self.tmp_path_for(user_id, test_id);
        tokio::fs::write(&tmp, raw.as_bytes()).await?;
        tokio::fs::rename(&tmp, self.path_for(user_id, test_id)).await?;
        debug!(test_id = %test_id, user_id = %user_id, "progress snapshot written");
        Ok(())
    }

    async fn load(
        &self,
        user_id: UserId,
        test_id: &TestId,
    ) -> Result<Option<AttemptSnapshot>, ProgressStoreError> {
        match tokio::fs::read_to_string(self.path_for(user_id, test_id)).await {
            Ok(raw) => decode(user_id, test_id, &raw).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                Err(ProgressStoreError::Corrupt {
                    test_id: test_id.clone(),
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self, user_id: UserId, test_id: &TestId) -> Result<(), ProgressStoreError> {
        match tokio::fs::remove_file(self.path_for(user_id, test_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_saved(&self, user_id: UserId) -> Result<Vec<TestId>, ProgressStoreError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(self.user_dir(user_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXT) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match TestId::new(stem) {
                Ok(id) => ids.push(id),
                Err(_) => warn!(path = %path.display(), "ignoring unexpected file in progress dir"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{AnswerMap, QuestionId};
    use quiz_core::time::fixed_now;
    use std::sync::LazyLock;

    static ADA: LazyLock<UserId> = LazyLock::new(UserId::random);
    static BOB: LazyLock<UserId> = LazyLock::new(UserId::random);

    fn ada() -> UserId {
        *ADA
    }

    fn bob() -> UserId {
        *BOB
    }

    fn snapshot(user_id: UserId, test: &str, remaining: u32) -> AttemptSnapshot {
        let mut answers = AnswerMap::new();
        answers.insert(QuestionId::new("q1").unwrap(), 2);
        AttemptSnapshot {
            user_id,
            test_id: TestId::new(test).unwrap(),
            question_index: 1,
            answers,
            remaining_secs: remaining,
            started_at: fixed_now(),
            saved_at: fixed_now(),
        }
    }

    async fn exercise(store: &dyn ProgressStore) {
        let html = TestId::new("html").unwrap();
        let css = TestId::new("css").unwrap();

        assert_eq!(store.load(ada(), &html).await.unwrap(), None);

        store.save(ada(), &html, &snapshot(ada(), "html", 100)).await.unwrap();
        store.save(ada(), &html, &snapshot(ada(), "html", 90)).await.unwrap();
        store.save(ada(), &css, &snapshot(ada(), "css", 50)).await.unwrap();

        let loaded = store.load(ada(), &html).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot(ada(), "html", 90));
        assert_eq!(
            store.list_saved(ada()).await.unwrap(),
            vec![css.clone(), html.clone()]
        );

        store.clear(ada(), &html).await.unwrap();
        store.clear(ada(), &html).await.unwrap();
        assert_eq!(store.load(ada(), &html).await.unwrap(), None);
        assert_eq!(store.list_saved(ada()).await.unwrap(), vec![css]);
    }

    async fn keeps_users_apart(store: &dyn ProgressStore) {
        let html = TestId::new("html").unwrap();
        store.save(ada(), &html, &snapshot(ada(), "html", 100)).await.unwrap();

        assert_eq!(store.load(bob(), &html).await.unwrap(), None);
        assert!(store.list_saved(bob()).await.unwrap().is_empty());

        store.save(bob(), &html, &snapshot(bob(), "html", 30)).await.unwrap();
        store.clear(bob(), &html).await.unwrap();
        assert_eq!(
            store.load(ada(), &html).await.unwrap(),
            Some(snapshot(ada(), "html", 100))
        );

        let err = store
            .save(bob(), &html, &snapshot(ada(), "html", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressStoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn in_memory_store_save_load_clear() {
        exercise(&InMemoryProgressStore::new()).await;
        keeps_users_apart(&InMemoryProgressStore::new()).await;
    }

    #[tokio::test]
    async fn file_store_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProgressStore::open(dir.path().join("progress")).await.unwrap();
        exercise(&store).await;

        let other = tempfile::tempdir().unwrap();
        keeps_users_apart(&FileProgressStore::open(other.path()).await.unwrap()).await;
    }

    #[tokio::test]
    async fn corrupt_payload_is_reported_not_swallowed() {
        let store = InMemoryProgressStore::new();
        let html = TestId::new("html").unwrap();
        store.insert_raw(ada(), &html, "{not json").unwrap();

        let err = store.load(ada(), &html).await.unwrap_err();
        assert!(matches!(err, ProgressStoreError::Corrupt { .. }));

        store.clear(ada(), &html).await.unwrap();
        assert_eq!(store.load(ada(), &html).await.unwrap(), None);
    }

    #[tokio::test]
    async fn payload_under_the_wrong_key_is_corrupt() {
        let store = InMemoryProgressStore::new();
        let html = TestId::new("html").unwrap();

        let raw = serde_json::to_string(&snapshot(ada(), "css", 10)).unwrap();
        store.insert_raw(ada(), &html, raw).unwrap();
        assert!(matches!(
            store.load(ada(), &html).await.unwrap_err(),
            ProgressStoreError::Corrupt { .. }
        ));

        let raw = serde_json::to_string(&snapshot(ada(), "html", 10)).unwrap();
        store.insert_raw(bob(), &html, raw).unwrap();
        assert!(matches!(
            store.load(bob(), &html).await.unwrap_err(),
            ProgressStoreError::Corrupt { .. }
        ));
    }

    #[tokio::test]
    async fn file_store_reports_garbage_file_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileProgressStore::open(dir.path()).await.unwrap();
        let html = TestId::new("html").unwrap();
        let user_dir = dir.path().join(ada().to_string());
        std::fs::create_dir_all(&user_dir).unwrap();
        std::fs::write(user_dir.join("html.json"), b"\x00\x01garbage").unwrap();
        std::fs::write(user_dir.join("notes.txt"), b"ignored").unwrap();

        assert!(matches!(
            store.load(ada(), &html).await.unwrap_err(),
            ProgressStoreError::Corrupt { .. }
        ));
        assert_eq!(store.list_saved(ada()).await.unwrap(), vec![html]);
    }
}

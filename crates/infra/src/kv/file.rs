use std::path::{Path, PathBuf};

use async_trait::async_trait;
use innkeeper_core::KeyValueStore;
use innkeeper_domain::Result;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::{fields, increment, remove_field, Hashes};
use crate::errors::{StoreError, StoreResult};

/// Hash store persisted as one JSON document
///
/// The whole document is held in memory and rewritten after every mutation
/// through a temporary file and a rename, so a crash leaves either the old
/// or the new contents on disk. Mutations are serialised by one async lock
/// and applied to a copy that only replaces the in-memory document once it
/// is on disk, so a failed write changes nothing.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    hashes: Mutex<Hashes>,
}

impl FileKeyValueStore {
    /// Open the store at `path`, creating parent directories when needed
    ///
    /// A missing file starts an empty store; an unreadable or malformed one
    /// is an error.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Write { path: parent.to_path_buf(), source })?;
        }

        let hashes = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Hashes::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|source| StoreError::Corrupt { path: path.clone(), source })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Hashes::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        info!(hashes = hashes.len(), "Opened file key-value store");
        Ok(Self { path, hashes: Mutex::new(hashes) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, hashes: &Hashes) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(hashes)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|source| StoreError::Write { path: tmp.clone(), source })?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|source| StoreError::Write { path: self.path.clone(), source })?;

        debug!(path = %self.path.display(), "Persisted key-value store");
        Ok(())
    }

    /// Persist `next`, then make it the in-memory document
    async fn commit(&self, current: &mut Hashes, next: Hashes) -> StoreResult<()> {
        self.persist(&next).await?;
        *current = next;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Value>> {
        Ok(self.hashes.lock().await.get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: Value) -> Result<()> {
        let mut hashes = self.hashes.lock().await;
        let mut next = hashes.clone();
        next.entry(key.to_string()).or_default().insert(field.to_string(), value);
        self.commit(&mut hashes, next).await?;
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        let mut hashes = self.hashes.lock().await;
        let mut next = hashes.clone();
        let removed = remove_field(&mut next, key, field);
        if removed {
            self.commit(&mut hashes, next).await?;
        }
        Ok(removed)
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, Value)>> {
        Ok(fields(&*self.hashes.lock().await, key))
    }

    async fn hlen(&self, key: &str) -> Result<usize> {
        Ok(self.hashes.lock().await.get(key).map_or(0, |h| h.len()))
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut hashes = self.hashes.lock().await;
        let mut next = hashes.clone();
        let value = increment(&mut next, key, field, delta)?;
        self.commit(&mut hashes, next).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<usize> {
        let mut hashes = self.hashes.lock().await;
        let mut next = hashes.clone();
        let removed = next.remove(key).map_or(0, |h| h.len());
        if removed > 0 {
            self.commit(&mut hashes, next).await?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use innkeeper_domain::InnkeeperError;
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    /// Validates contents survive reopening the store.
    ///
    /// Assertions:
    /// - Confirms fields and counters written before reopening are readable
    ///   after.
    /// - Confirms no temporary file is left behind.
    #[tokio::test]
    async fn test_reopen_preserves_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join("dlq.json");

        {
            let store = FileKeyValueStore::open(&path).await.unwrap();
            store.hset("dlq:messages", "m1", json!({ "payload": "hello" })).await.unwrap();
            store.hincr("dlq:counters", "total_enqueued", 1).await.unwrap();
        }

        let reopened = FileKeyValueStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.hget("dlq:messages", "m1").await.unwrap(),
            Some(json!({ "payload": "hello" }))
        );
        assert_eq!(reopened.hincr("dlq:counters", "total_enqueued", 0).await.unwrap(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_delete_and_hdel_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dlq.json");

        let store = FileKeyValueStore::open(&path).await.unwrap();
        store.hset("a", "1", json!(1)).await.unwrap();
        store.hset("a", "2", json!(2)).await.unwrap();
        store.hset("b", "1", json!(1)).await.unwrap();
        assert!(store.hdel("b", "1").await.unwrap());
        assert_eq!(store.delete("a").await.unwrap(), 2);

        let reopened = FileKeyValueStore::open(&path).await.unwrap();
        assert_eq!(reopened.hlen("a").await.unwrap(), 0);
        assert_eq!(reopened.hlen("b").await.unwrap(), 0);
    }

    /// Validates a failed write leaves the in-memory document untouched.
    ///
    /// Assertions:
    /// - Confirms every mutation errors while the temporary file cannot be
    ///   written.
    /// - Confirms reads still return the last persisted contents.
    /// - Confirms writes succeed again once the obstruction is gone.
    #[tokio::test]
    async fn test_failed_persist_keeps_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dlq.json");

        let store = FileKeyValueStore::open(&path).await.unwrap();
        store.hset("dlq:messages", "m1", json!("old")).await.unwrap();
        store.hincr("dlq:counters", "total_enqueued", 1).await.unwrap();

        // A directory where the temporary file goes makes every write fail.
        let tmp = path.with_extension("json.tmp");
        std::fs::create_dir(&tmp).unwrap();

        assert!(store.hset("dlq:messages", "m1", json!("new")).await.is_err());
        assert!(store.hset("dlq:messages", "m2", json!("new")).await.is_err());
        assert!(store.hincr("dlq:counters", "total_enqueued", 1).await.is_err());
        assert!(store.hdel("dlq:messages", "m1").await.is_err());
        assert!(store.delete("dlq:counters").await.is_err());

        assert_eq!(store.hget("dlq:messages", "m1").await.unwrap(), Some(json!("old")));
        assert_eq!(store.hlen("dlq:messages").await.unwrap(), 1);
        assert_eq!(
            store.hget("dlq:counters", "total_enqueued").await.unwrap(),
            Some(json!(1))
        );

        std::fs::remove_dir(&tmp).unwrap();
        store.hset("dlq:messages", "m2", json!("new")).await.unwrap();
        let reopened = FileKeyValueStore::open(&path).await.unwrap();
        assert_eq!(reopened.hlen("dlq:messages").await.unwrap(), 2);
        assert_eq!(reopened.hincr("dlq:counters", "total_enqueued", 0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dlq.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = FileKeyValueStore::open(&path).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(matches!(InnkeeperError::from(err), InnkeeperError::Storage(_)));
    }
}

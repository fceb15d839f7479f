//! Debate persistence.
//!
//! Stores hold one [`DebateRecord`] per debate, keyed by id. A write
//! replaces the whole record; concurrent writers resolve last-writer-wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::debate::DebateRecord;
use crate::error::DebateError;

#[async_trait]
pub trait DebateStore: Send + Sync {
    /// Insert or replace the record with `record.id`.
    async fn put(&self, record: &DebateRecord) -> Result<(), DebateError>;

    async fn get(&self, id: Uuid) -> Result<Option<DebateRecord>, DebateError>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<DebateRecord>, DebateError>;
}

/// One JSON file per debate inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, DebateError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            DebateError::StorageError(format!("Cannot create {}: {}", dir.display(), e))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }
}

#[async_trait]
impl DebateStore for FileStore {
    async fn put(&self, record: &DebateRecord) -> Result<(), DebateError> {
        let path = self.record_path(record.id);
        let tmp = self.dir.join(format!(".{}.json.tmp", record.id));
        let bytes = serde_json::to_vec_pretty(record)?;

        // Write aside then rename so readers never see a partial record.
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(id = %record.id, path = %path.display(), "debate saved");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DebateRecord>, DebateError> {
        match tokio::fs::read(self.record_path(id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<DebateRecord>, DebateError> {
        let mut records = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == "json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }

            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<DebateRecord>(&bytes) {
                Ok(record) => records.push(record),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable debate record"),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

/// In-process store, for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Uuid, DebateRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DebateStore for MemoryStore {
    async fn put(&self, record: &DebateRecord) -> Result<(), DebateError> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DebateRecord>, DebateError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<DebateRecord>, DebateError> {
        let mut records: Vec<DebateRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::{Debate, Position};
    use crate::transcript::Speaker;
    use chrono::Duration;

    fn sample_record(topic: &str, age_minutes: i64) -> DebateRecord {
        let mut debate = Debate::new(topic, Position::For);
        debate.created_at -= Duration::minutes(age_minutes);
        debate.transcript.append(Speaker::User, "Opening argument.", None);
        debate.to_record().unwrap()
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("debates")).await.unwrap();
        let record = sample_record("Remote work", 0);

        store.put(&record).await.unwrap();
        let loaded = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert_eq!(Debate::from_record(loaded).unwrap().transcript.len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_store_replaces_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let mut record = sample_record("Nuclear power", 0);
        store.put(&record).await.unwrap();

        record.evaluation = Some("Score: 50/100".to_string());
        store.put(&record).await.unwrap();

        let loaded = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(loaded.evaluation.as_deref(), Some("Score: 50/100"));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_lists_newest_first_and_skips_junk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let old = sample_record("Old topic", 60);
        let new = sample_record("New topic", 1);
        store.put(&old).await.unwrap();
        store.put(&new).await.unwrap();
        tokio::fs::write(dir.path().join("notes.json"), b"not json").await.unwrap();
        tokio::fs::write(dir.path().join("readme.txt"), b"hello").await.unwrap();

        let topics: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.topic)
            .collect();
        assert_eq!(topics, vec!["New topic", "Old topic"]);
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryStore::new();
        let old = sample_record("Old topic", 10);
        let new = sample_record("New topic", 0);
        store.put(&old).await.unwrap();
        store.put(&new).await.unwrap();

        assert_eq!(store.get(old.id).await.unwrap(), Some(old));
        assert_eq!(store.list().await.unwrap()[0].topic, "New topic");
    }
}

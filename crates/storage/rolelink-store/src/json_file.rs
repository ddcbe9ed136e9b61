//! JSON file persistence for user attributes.
//!
//! The whole map is kept in memory and rewritten to disk on every upsert via a
//! temp file and rename, so a crash never leaves a half-written file behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rolelink_core::{AttributeFields, AttributeStore, StoreResult, UserAttributes};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

pub struct JsonFileAttributeStore {
    path: PathBuf,
    records: Mutex<HashMap<String, UserAttributes>>,
}

impl JsonFileAttributeStore {
    /// Open the store at `path`, creating parent directories as needed.
    ///
    /// A file that exists but does not parse is a fatal error; it is never
    /// silently replaced.
    #[instrument]
    pub async fn open(path: impl AsRef<Path> + std::fmt::Debug) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let records = if fs::try_exists(&path).await? {
            let json = fs::read(&path).await?;
            let records: HashMap<String, UserAttributes> =
                serde_json::from_slice(&json).map_err(|e| {
                    error!(file = ?path, "Failed to parse attribute file: {}", e);
                    e
                })?;
            info!(records = records.len(), "Loaded attribute store");
            records
        } else {
            info!("No attribute file found, starting empty");
            HashMap::new()
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, json: &[u8]) -> std::io::Result<()> {
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &self.path).await
    }
}

#[async_trait]
impl AttributeStore for JsonFileAttributeStore {
    async fn get(&self, user_id: &str) -> StoreResult<Option<UserAttributes>> {
        let records = self.records.lock().await;
        Ok(records.get(user_id).cloned())
    }

    #[instrument(skip(self, fields, timestamp))]
    async fn upsert(
        &self,
        user_id: &str,
        fields: AttributeFields,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut records = self.records.lock().await;

        let updated = match records.get(user_id) {
            Some(existing) => {
                let mut record = existing.clone();
                record.apply(fields, timestamp);
                record
            }
            None => UserAttributes::new(user_id, fields, timestamp),
        };
        let previous = records.insert(user_id.to_string(), updated);

        let outcome = match serde_json::to_vec_pretty(&*records) {
            Ok(json) => match self.persist(&json).await {
                Ok(()) => Ok(true),
                Err(e) => {
                    warn!(file = ?self.path, "Failed to write attribute file: {}", e);
                    Ok(false)
                }
            },
            Err(e) => Err(e.into()),
        };

        if !matches!(outcome, Ok(true)) {
            match previous {
                Some(previous) => records.insert(user_id.to_string(), previous),
                None => records.remove(user_id),
            };
        } else {
            debug!("Attribute record persisted");
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolelink_core::StoreError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attributes.json");

        let store = JsonFileAttributeStore::open(&path).await.unwrap();
        assert!(
            store
                .upsert("99", AttributeFields { is_assistant: true }, Utc::now())
                .await
                .unwrap()
        );
        drop(store);

        let reopened = JsonFileAttributeStore::open(&path).await.unwrap();
        let record = reopened.get("99").await.unwrap().unwrap();
        assert!(record.is_assistant);
        assert!(reopened.get("100").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data").join("attributes.json");

        let store = JsonFileAttributeStore::open(&path).await.unwrap();
        store
            .upsert("1", AttributeFields::default(), Utc::now())
            .await
            .unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attributes.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result = JsonFileAttributeStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_write_failure_reports_false_and_keeps_previous_state() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        let path = data_dir.join("attributes.json");

        let store = JsonFileAttributeStore::open(&path).await.unwrap();
        store
            .upsert("5", AttributeFields { is_assistant: false }, Utc::now())
            .await
            .unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();

        let written = store
            .upsert("5", AttributeFields { is_assistant: true }, Utc::now())
            .await
            .unwrap();
        assert!(!written);
        assert!(!store.get("5").await.unwrap().unwrap().is_assistant);

        let written = store
            .upsert("6", AttributeFields { is_assistant: true }, Utc::now())
            .await
            .unwrap();
        assert!(!written);
        assert!(store.get("6").await.unwrap().is_none());
    }
}

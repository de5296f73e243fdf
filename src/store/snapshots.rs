//! Onboarding snapshots: the two partial records written during the flow.
//!
//! Each snapshot is a JSON object stored whole under its own key. A write
//! replaces the previous value; combining the two is the reconciler's job.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StorageError;
use crate::store::traits::KeyValueStore;

/// A snapshot's contents: field name to value.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// The two snapshot slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKey {
    /// Written right after the credentials step.
    Credentials,
    /// Written right before the submission step.
    Profile,
}

impl SnapshotKey {
    pub const ALL: [SnapshotKey; 2] = [SnapshotKey::Credentials, SnapshotKey::Profile];

    /// Storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credentials => "onboarding.credentials",
            Self::Profile => "onboarding.profile",
        }
    }
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    written_at: DateTime<Utc>,
    record: Record,
}

/// Which snapshots exist and when they were written.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SnapshotStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_written_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_written_at: Option<DateTime<Utc>>,
}

impl SnapshotStatus {
    /// True when neither snapshot exists.
    pub fn is_empty(&self) -> bool {
        self.credentials_written_at.is_none() && self.profile_written_at.is_none()
    }
}

/// Typed snapshot access over a [`KeyValueStore`].
#[derive(Clone)]
pub struct SnapshotStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// The underlying key-value store.
    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    /// Replace the snapshot under `key` with `record`.
    pub async fn write_snapshot(&self, key: SnapshotKey, record: &Record) -> Result<(), StorageError> {
        let envelope = Envelope {
            written_at: Utc::now(),
            record: record.clone(),
        };
        let raw = serde_json::to_string(&envelope)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.kv.set(key.as_str(), &raw).await?;
        info!(snapshot = %key, fields = record.len(), "Snapshot written");
        Ok(())
    }

    /// Read the snapshot under `key`, `None` if absent.
    pub async fn read_snapshot(&self, key: SnapshotKey) -> Result<Option<Record>, StorageError> {
        Ok(self.read_envelope(key).await?.map(|e| e.record))
    }

    /// Remove the snapshot under `key`. Returns whether it existed.
    pub async fn clear(&self, key: SnapshotKey) -> Result<bool, StorageError> {
        let existed = self.kv.remove(key.as_str()).await?;
        debug!(snapshot = %key, existed, "Snapshot cleared");
        Ok(existed)
    }

    /// Remove both snapshots without reading them. Returns how many existed.
    pub async fn clear_all(&self) -> Result<usize, StorageError> {
        let mut removed = 0;
        for key in SnapshotKey::ALL {
            if self.clear(key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Report which snapshots exist.
    pub async fn status(&self) -> Result<SnapshotStatus, StorageError> {
        Ok(SnapshotStatus {
            credentials_written_at: self
                .read_envelope(SnapshotKey::Credentials)
                .await?
                .map(|e| e.written_at),
            profile_written_at: self
                .read_envelope(SnapshotKey::Profile)
                .await?
                .map(|e| e.written_at),
        })
    }

    async fn read_envelope(&self, key: SnapshotKey) -> Result<Option<Envelope>, StorageError> {
        let Some(raw) = self.kv.get(key.as_str()).await? else {
            return Ok(None);
        };
        let envelope = serde_json::from_str(&raw)
            .map_err(|e| StorageError::Serialization(format!("{key}: {e}")))?;
        Ok(Some(envelope))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryStore;

    fn record(value: serde_json::Value) -> Record {
        value.as_object().unwrap().clone()
    }

    fn store() -> SnapshotStore {
        SnapshotStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn write_replaces_whole_record() {
        let store = store();
        store
            .write_snapshot(SnapshotKey::Profile, &record(json!({"age": 23, "gender": "male"})))
            .await
            .unwrap();
        store
            .write_snapshot(SnapshotKey::Profile, &record(json!({"age": 24})))
            .await
            .unwrap();

        let read = store.read_snapshot(SnapshotKey::Profile).await.unwrap().unwrap();
        assert_eq!(read, record(json!({"age": 24})));
    }

    #[tokio::test]
    async fn keys_do_not_interfere() {
        let store = store();
        store
            .write_snapshot(SnapshotKey::Credentials, &record(json!({"email": "a@b.com"})))
            .await
            .unwrap();
        assert!(store.read_snapshot(SnapshotKey::Profile).await.unwrap().is_none());

        let status = store.status().await.unwrap();
        assert!(status.credentials_written_at.is_some());
        assert!(status.profile_written_at.is_none());
        assert!(!status.is_empty());
    }

    #[tokio::test]
    async fn clear_all_empties_both() {
        let store = store();
        for key in SnapshotKey::ALL {
            store.write_snapshot(key, &Record::new()).await.unwrap();
        }
        assert_eq!(store.clear_all().await.unwrap(), 2);
        assert!(store.status().await.unwrap().is_empty());
        assert_eq!(store.clear_all().await.unwrap(), 0);
        assert!(!store.clear(SnapshotKey::Profile).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_a_storage_error() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(SnapshotKey::Profile.as_str(), "{not json").await.unwrap();
        let store = SnapshotStore::new(kv);

        let err = store.read_snapshot(SnapshotKey::Profile).await.unwrap_err();
        assert!(matches!(err, StorageError::Serialization(ref msg) if msg.contains("onboarding.profile")));
    }
}

//! Status sink/reader traits and the blob-backed status store

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::providers::BlobStore;
use crate::types::{DocumentStatus, StorageLayout};

/// A recorded status with its timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: DocumentStatus,
    pub updated_at: DateTime<Utc>,
}

impl StatusEntry {
    pub fn now(status: DocumentStatus) -> Self {
        Self {
            status,
            updated_at: Utc::now(),
        }
    }
}

/// Write side of status tracking; the pipeline only ever writes
#[async_trait]
pub trait StatusSink: Send + Sync {
    /// Record a new status for a document
    ///
    /// Returns whether the status was recorded; rejected transitions are
    /// logged and reported as `false`.
    async fn update(&self, id: &str, status: DocumentStatus) -> Result<bool>;
}

/// Read side of status tracking, used by pollers
#[async_trait]
pub trait StatusReader: Send + Sync {
    /// Latest status, `None` when nothing was ever recorded
    async fn get(&self, id: &str) -> Result<Option<StatusEntry>>;

    /// All known documents with their latest status
    async fn list(&self) -> Result<Vec<(String, StatusEntry)>>;

    /// Forget a document
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Whether `next` may replace `current`.
///
/// Only `uploaded` may create a record, so runs for a forgotten document
/// write nothing. Terminal states are final.
pub(crate) fn accepts_transition(
    id: &str,
    current: Option<DocumentStatus>,
    next: DocumentStatus,
) -> bool {
    match current {
        None if next == DocumentStatus::Uploaded => true,
        None => {
            tracing::warn!("[{}] Ignoring status {} for untracked document", id, next);
            false
        }
        Some(current) if current.can_transition_to(next) => true,
        Some(current) => {
            tracing::warn!(
                "[{}] Ignoring status transition {} -> {}",
                id,
                current,
                next
            );
            false
        }
    }
}

/// Status store persisting one JSON entry per document in a blob store
pub struct BlobStatusStore {
    store: Arc<dyn BlobStore>,
    layout: StorageLayout,
}

impl BlobStatusStore {
    pub fn new(store: Arc<dyn BlobStore>, layout: StorageLayout) -> Self {
        Self { store, layout }
    }

    fn id_from_key<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(&self.layout.status_prefix)?
            .strip_suffix(".json")
    }
}

#[async_trait]
impl StatusSink for BlobStatusStore {
    async fn update(&self, id: &str, status: DocumentStatus) -> Result<bool> {
        let current = self.get(id).await?.map(|e| e.status);
        if !accepts_transition(id, current, status) {
            return Ok(false);
        }

        let entry = StatusEntry::now(status);
        let data = serde_json::to_vec(&entry)?;
        self.store
            .put(&self.layout.status_key(id), Bytes::from(data), "application/json")
            .await?;
        Ok(true)
    }
}

#[async_trait]
impl StatusReader for BlobStatusStore {
    async fn get(&self, id: &str) -> Result<Option<StatusEntry>> {
        match self.store.get(&self.layout.status_key(id)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> Result<Vec<(String, StatusEntry)>> {
        let mut keys = self.store.list(&self.layout.status_prefix).await?;
        keys.sort();

        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(id) = self.id_from_key(&key) else {
                continue;
            };
            match self.store.get(&key).await {
                Ok(data) => match serde_json::from_slice::<StatusEntry>(&data) {
                    Ok(entry) => entries.push((id.to_string(), entry)),
                    Err(e) => tracing::warn!("Skipping unreadable status entry {}: {}", key, e),
                },
                // Deleted between list and get
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(entries)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.store.delete(&self.layout.status_key(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::local::MemoryBlobStore;

    fn store() -> BlobStatusStore {
        BlobStatusStore::new(Arc::new(MemoryBlobStore::new()), StorageLayout::default())
    }

    #[tokio::test]
    async fn test_roundtrip_and_listing() {
        let statuses = store();
        statuses.update("b", DocumentStatus::Uploaded).await.unwrap();
        statuses.update("a", DocumentStatus::Uploaded).await.unwrap();
        statuses.update("a", DocumentStatus::ExtractingText).await.unwrap();

        let entry = statuses.get("a").await.unwrap().unwrap();
        assert_eq!(entry.status, DocumentStatus::ExtractingText);

        let listed: Vec<_> = statuses
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|(id, e)| (id, e.status))
            .collect();
        assert_eq!(
            listed,
            vec![
                ("a".to_string(), DocumentStatus::ExtractingText),
                ("b".to_string(), DocumentStatus::Uploaded),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_is_none() {
        assert!(store().get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let statuses = store();
        statuses.update("a", DocumentStatus::Uploaded).await.unwrap();
        statuses.update("a", DocumentStatus::ExtractingText).await.unwrap();
        statuses.update("a", DocumentStatus::ErrorEmptyDocument).await.unwrap();
        assert!(!statuses.update("a", DocumentStatus::Analyzing).await.unwrap());

        let entry = statuses.get("a").await.unwrap().unwrap();
        assert_eq!(entry.status, DocumentStatus::ErrorEmptyDocument);
    }

    #[tokio::test]
    async fn test_untracked_document_only_accepts_uploaded() {
        let statuses = store();
        assert!(!statuses.update("gone", DocumentStatus::ExtractingText).await.unwrap());
        assert!(!statuses.update("gone", DocumentStatus::ErrorProcessingFailed).await.unwrap());
        assert!(statuses.get("gone").await.unwrap().is_none());

        statuses.update("gone", DocumentStatus::Uploaded).await.unwrap();
        statuses.remove("gone").await.unwrap();
        assert!(!statuses.update("gone", DocumentStatus::Processed).await.unwrap());
        assert!(statuses.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let statuses = store();
        statuses.update("a", DocumentStatus::Uploaded).await.unwrap();
        statuses.remove("a").await.unwrap();
        assert!(statuses.get("a").await.unwrap().is_none());
    }
}

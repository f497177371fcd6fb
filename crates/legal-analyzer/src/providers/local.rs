//! Local provider implementations using process memory and the filesystem
//!
//! Used for development, tests and single-node deployments.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DocumentStatus;

use super::blob_store::BlobStore;
use super::status::{accepts_transition, StatusEntry, StatusReader, StatusSink};

/// In-memory blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, (Bytes, String)>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Media type recorded for a key
    pub fn media_type(&self, key: &str) -> Option<String> {
        self.blobs.get(key).map(|entry| entry.value().1.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: Bytes, media_type: &str) -> Result<()> {
        self.blobs
            .insert(key.to_string(), (data, media_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(key)
            .map(|entry| entry.value().0.to_vec())
            .ok_or_else(|| Error::not_found(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(key))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// Blob store rooted at a local directory; keys map to relative paths
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Create a new local blob store, creating the root directory
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path for a key, rejecting keys that would escape the root
    fn blob_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(Error::InvalidRequest(format!("Invalid blob key: {}", key)));
        }
        Ok(self.root.join(relative))
    }

    /// Deepest directory that can hold keys starting with `prefix`
    fn search_root(&self, prefix: &str) -> Result<PathBuf> {
        match prefix.rfind('/') {
            Some(end) => self.blob_path(&prefix[..end]),
            None => Ok(self.root.clone()),
        }
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<_> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(parts.join("/"))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, data: Bytes, _media_type: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write then rename so readers never see a partial blob
        let tmp = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, &data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found(key)),
            Err(e) => Err(Error::storage(format!("Failed to read blob {}: {}", key, e))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.search_root(prefix)?;
        let files = tokio::task::spawn_blocking(move || {
            walkdir::WalkDir::new(&dir)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect::<Vec<_>>()
        })
        .await
        .map_err(|e| Error::internal(format!("Task join error: {}", e)))?;

        Ok(files
            .iter()
            .filter(|path| path.extension().map_or(true, |ext| ext != "tmp"))
            .filter_map(|path| self.key_for(path))
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.blob_path(key)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.root.exists())
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}

/// In-memory status store that also keeps each document's accepted updates in order
#[derive(Default)]
pub struct MemoryStatusStore {
    latest: DashMap<String, StatusEntry>,
    history: DashMap<String, Vec<DocumentStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted statuses for one document, oldest first
    pub fn history(&self, id: &str) -> Vec<DocumentStatus> {
        self.history
            .get(id)
            .map(|statuses| statuses.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StatusSink for MemoryStatusStore {
    async fn update(&self, id: &str, status: DocumentStatus) -> Result<bool> {
        let current = self.latest.get(id).map(|entry| entry.status);
        if !accepts_transition(id, current, status) {
            return Ok(false);
        }

        self.latest.insert(id.to_string(), StatusEntry::now(status));
        self.history.entry(id.to_string()).or_default().push(status);
        Ok(true)
    }
}

#[async_trait]
impl StatusReader for MemoryStatusStore {
    async fn get(&self, id: &str) -> Result<Option<StatusEntry>> {
        Ok(self.latest.get(id).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> Result<Vec<(String, StatusEntry)>> {
        let mut entries: Vec<_> = self
            .latest
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.latest.remove(id);
        self.history.remove(id);
        Ok(())
    }
}

//! Blob store provider trait for raw uploads and processed artifacts

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Trait for key/value blob storage
///
/// Keys are `/`-separated paths such as `raw/<uuid>.pdf`. `list` returns keys
/// in no guaranteed order; callers needing determinism must sort.
///
/// Implementations:
/// - `MemoryBlobStore`: process-local map
/// - `LocalBlobStore`: local filesystem
/// - `GcsBlobStore`: Google Cloud Storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing blob
    async fn put(&self, key: &str, data: Bytes, media_type: &str) -> Result<()>;

    /// Read a blob; `Error::DocumentNotFound` when missing
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Keys starting with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Delete a blob; deleting a missing key is not an error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a blob exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Delete every blob under `prefix`, returning how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.list(prefix).await?;
        for key in &keys {
            self.delete(key).await?;
        }
        Ok(keys.len())
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

//! Document-level operations shared by the HTTP server and the CLI

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::locator::is_exact_stem;
use super::worker::{PipelineJob, PipelineWorker};
use crate::error::{Error, Result};
use crate::providers::{BlobStore, StatusReader, StatusSink};
use crate::types::document::key_extension;
use crate::types::{
    AnalysisResult, DocumentPhase, DocumentRecord, DocumentStatus, FileType, StorageLayout,
};

/// What a poller sees for one document
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentView {
    pub doc_id: String,
    pub status: DocumentStatus,
    pub phase: DocumentPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the document listing
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub status: DocumentStatus,
    pub phase: DocumentPhase,
    pub updated_at: DateTime<Utc>,
}

/// Upload, poll, list and delete documents
pub struct DocumentService {
    store: Arc<dyn BlobStore>,
    status_sink: Arc<dyn StatusSink>,
    status_reader: Arc<dyn StatusReader>,
    worker: PipelineWorker,
    layout: StorageLayout,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn BlobStore>,
        status_sink: Arc<dyn StatusSink>,
        status_reader: Arc<dyn StatusReader>,
        worker: PipelineWorker,
        layout: StorageLayout,
    ) -> Self {
        Self {
            store,
            status_sink,
            status_reader,
            worker,
            layout,
        }
    }

    /// Store an upload under a fresh identifier and queue it for processing.
    ///
    /// The file type comes from the filename's extension, falling back to
    /// the declared media type.
    pub async fn upload(
        &self,
        filename: &str,
        declared_media_type: Option<&str>,
        data: Bytes,
    ) -> Result<DocumentRecord> {
        let file_type = upload_file_type(filename, declared_media_type);
        let extension = file_type
            .extension()
            .ok_or_else(|| Error::UnsupportedFileType(filename.to_string()))?;
        if data.is_empty() {
            return Err(Error::InvalidRequest(format!("Empty file: {}", filename)));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let record = DocumentRecord::uploaded(id.clone(), extension, &self.layout);
        let size = data.len();

        self.store
            .put(&record.raw_key, data, file_type.media_type())
            .await?;
        self.status_sink
            .update(&id, DocumentStatus::Uploaded)
            .await?;

        tracing::info!(
            "[{}] Uploaded {} ({} bytes) as {}",
            id,
            filename,
            size,
            record.raw_key
        );

        let job = PipelineJob {
            id: id.clone(),
            media_type: Some(file_type.media_type().to_string()),
        };
        if let Err(e) = self.worker.submit(job) {
            tracing::warn!("[{}] Could not queue upload, rolling back: {}", id, e);
            self.discard(&record).await;
            return Err(e);
        }

        Ok(record)
    }

    /// Drop the blob and status of an upload that never got queued
    async fn discard(&self, record: &DocumentRecord) {
        if let Err(e) = self.status_reader.remove(&record.id).await {
            tracing::warn!("[{}] Failed to remove status: {}", record.id, e);
        }
        if let Err(e) = self.store.delete(&record.raw_key).await {
            tracing::warn!("[{}] Failed to remove {}: {}", record.id, record.raw_key, e);
        }
    }

    /// Current status, with the analysis once processed
    pub async fn status_view(&self, id: &str) -> Result<DocumentView> {
        let entry = self
            .status_reader
            .get(id)
            .await?
            .ok_or_else(|| Error::not_found(id))?;

        let result = if entry.status == DocumentStatus::Processed {
            match self.analysis(id).await {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::warn!("[{}] Processed but analysis unreadable: {}", id, e);
                    None
                }
            }
        } else {
            None
        };

        Ok(DocumentView {
            doc_id: id.to_string(),
            status: entry.status,
            phase: entry.status.phase(),
            result,
            error: entry.status.error_reason().map(str::to_string),
            updated_at: entry.updated_at,
        })
    }

    /// Stored analysis; not-found until the document is processed
    pub async fn analysis(&self, id: &str) -> Result<AnalysisResult> {
        let data = self.store.get(&self.layout.processed_key(id)).await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// All documents with a recorded status, sorted by identifier
    pub async fn list(&self) -> Result<Vec<DocumentSummary>> {
        let mut entries = self.status_reader.list().await?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(entries
            .into_iter()
            .map(|(doc_id, entry)| DocumentSummary {
                doc_id,
                status: entry.status,
                phase: entry.status.phase(),
                updated_at: entry.updated_at,
            })
            .collect())
    }

    /// Remove raw blob(s), the processed artifact and the status entry.
    ///
    /// Returns the number of blobs removed.
    pub async fn delete(&self, id: &str) -> Result<usize> {
        let known = self.status_reader.get(id).await?.is_some();

        let prefix = self.layout.raw_search_prefix(id);
        let mut keys: Vec<String> = self
            .store
            .list(&prefix)
            .await?
            .into_iter()
            .filter(|key| is_exact_stem(key, &prefix))
            .collect();

        let processed = self.layout.processed_key(id);
        if self.store.exists(&processed).await? {
            keys.push(processed);
        }

        if !known && keys.is_empty() {
            return Err(Error::not_found(id));
        }

        for key in &keys {
            self.store.delete(key).await?;
        }
        self.status_reader.remove(id).await?;

        tracing::info!("[{}] Deleted {} blobs", id, keys.len());
        Ok(keys.len())
    }
}

/// File type for an upload: filename extension, then declared media type
fn upload_file_type(filename: &str, declared_media_type: Option<&str>) -> FileType {
    let by_extension = key_extension(filename)
        .map(|ext| FileType::from_extension(&ext))
        .unwrap_or(FileType::Unknown);
    if by_extension.is_supported() {
        return by_extension;
    }
    declared_media_type
        .map(FileType::from_media_type)
        .unwrap_or(FileType::Unknown)
}

//! Document processing pipeline: extraction, analysis, persistence
//!
//! A run moves a document through
//! `extracting_text -> analyzing -> processed`, stopping at
//! `error_empty_document` when no text was found. Any other fault ends the
//! run in `error_processing_failed`; [`Pipeline::run`] never returns an error.

use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::locator::DocumentLocator;
use crate::analysis::AnalysisClient;
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::ingestion::TextExtractor;
use crate::providers::{BlobStore, OcrProvider, StatusSink};
use crate::types::document::MEDIA_TYPE_OCTET_STREAM;
use crate::types::{BlobRef, DocumentStatus, StorageLayout};

/// Orchestrates one document from raw blob to processed artifact
pub struct Pipeline {
    store: Arc<dyn BlobStore>,
    statuses: Arc<dyn StatusSink>,
    locator: DocumentLocator,
    extractor: Arc<TextExtractor>,
    ocr: Option<Arc<dyn OcrProvider>>,
    analysis: AnalysisClient,
    layout: StorageLayout,
    extraction_timeout: Duration,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn BlobStore>,
        statuses: Arc<dyn StatusSink>,
        analysis: AnalysisClient,
        layout: StorageLayout,
    ) -> Self {
        Self {
            locator: DocumentLocator::new(store.clone(), layout.clone()),
            store,
            statuses,
            extractor: Arc::new(TextExtractor::default()),
            ocr: None,
            analysis,
            layout,
            extraction_timeout: ExtractionConfig::default().timeout(),
        }
    }

    /// Route supported media types through an OCR service
    pub fn with_ocr(mut self, ocr: Arc<dyn OcrProvider>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_extraction_timeout(mut self, extraction_timeout: Duration) -> Self {
        self.extraction_timeout = extraction_timeout;
        self
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Process document `id`, returning its terminal status.
    ///
    /// `media_type` is the type declared at upload; without it the stored
    /// blob's extension decides how text is extracted.
    pub async fn run(&self, id: &str, media_type: Option<&str>) -> DocumentStatus {
        let start = std::time::Instant::now();

        match self.process(id, media_type).await {
            Ok(status) => {
                tracing::info!(
                    "[{}] Finished with status {} in {:.1}s",
                    id,
                    status,
                    start.elapsed().as_secs_f64()
                );
                status
            }
            Err(e) => {
                tracing::error!("[{}] Processing failed: {}", id, e);
                let status = DocumentStatus::ErrorProcessingFailed;
                if let Err(e) = self.statuses.update(id, status).await {
                    tracing::error!("[{}] Failed to record error status: {}", id, e);
                }
                status
            }
        }
    }

    async fn process(&self, id: &str, media_type: Option<&str>) -> Result<DocumentStatus> {
        self.advance(id, DocumentStatus::ExtractingText).await?;

        let text = self.extract_text(id, media_type).await?;
        if text.is_empty() {
            tracing::warn!("[{}] No text extracted", id);
            let status = DocumentStatus::ErrorEmptyDocument;
            self.advance(id, status).await?;
            return Ok(status);
        }
        tracing::info!("[{}] Extracted {} chars, analyzing", id, text.chars().count());

        self.advance(id, DocumentStatus::Analyzing).await?;
        let result = self.analysis.analyze(&text).await;
        if result.is_failure() {
            tracing::warn!("[{}] Analysis degraded to failure result", id);
        }

        let key = self.layout.processed_key(id);
        self.store
            .put(&key, Bytes::from(result.to_artifact()?), "application/json")
            .await?;
        tracing::debug!("[{}] Stored analysis at {}", id, key);

        let status = DocumentStatus::Processed;
        if let Err(e) = self.advance(id, status).await {
            // Deleted while analyzing
            self.store.delete(&key).await?;
            return Err(e);
        }
        Ok(status)
    }

    /// Record `status`, abandoning the run when the store rejects it
    async fn advance(&self, id: &str, status: DocumentStatus) -> Result<()> {
        if self.statuses.update(id, status).await? {
            Ok(())
        } else {
            Err(Error::internal(format!(
                "Status {} not recorded for {}; abandoning run",
                status, id
            )))
        }
    }

    /// Locate, read and extract the raw blob; the result is trimmed
    async fn extract_text(&self, id: &str, declared: Option<&str>) -> Result<String> {
        let mut blob = self.locator.locate(id).await?;
        if let Some(media_type) = declared.map(str::trim).filter(|m| is_specific(m)) {
            blob.media_type = media_type.to_string();
        }

        let data = self.store.get(&blob.key).await?;
        tracing::info!(
            "[{}] Extracting text from {} ({} bytes, {})",
            id,
            blob.key,
            data.len(),
            blob.media_type
        );

        let text = match &self.ocr {
            Some(ocr) if ocr.supports(&blob.media_type) => {
                self.extract_with_ocr(ocr, &blob, &data).await?
            }
            _ => self.extract_locally(blob, data).await?,
        };
        Ok(text.trim().to_string())
    }

    async fn extract_with_ocr(
        &self,
        ocr: &Arc<dyn OcrProvider>,
        blob: &BlobRef,
        data: &[u8],
    ) -> Result<String> {
        timeout(self.extraction_timeout, ocr.process(blob, data))
            .await
            .map_err(|_| {
                Error::extraction(format!(
                    "OCR timed out after {}s for {}",
                    self.extraction_timeout.as_secs(),
                    blob.key
                ))
            })?
    }

    /// Parsers are synchronous and may be slow; run them off the async workers
    async fn extract_locally(&self, blob: BlobRef, data: Vec<u8>) -> Result<String> {
        let extractor = self.extractor.clone();
        let key = blob.key.clone();
        let task = tokio::task::spawn_blocking(move || extractor.extract_blob(&data, &blob));

        timeout(self.extraction_timeout, task)
            .await
            .map_err(|_| {
                Error::extraction(format!(
                    "Extraction timed out after {}s for {}",
                    self.extraction_timeout.as_secs(),
                    key
                ))
            })?
            .map_err(|e| Error::extraction(format!("Extraction task failed: {}", e)))
    }
}

fn is_specific(media_type: &str) -> bool {
    !media_type.is_empty() && !media_type.eq_ignore_ascii_case(MEDIA_TYPE_OCTET_STREAM)
}

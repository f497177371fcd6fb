//! OCR / document-understanding provider trait

use async_trait::async_trait;

use crate::error::Result;
use crate::types::BlobRef;

/// Trait for an external text extraction service
///
/// Implementations:
/// - `DocumentAiClient`: Google Document AI
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Extract text from a stored blob whose bytes are `content`
    async fn process(&self, blob: &BlobRef, content: &[u8]) -> Result<String>;

    /// Whether the service accepts this media type
    fn supports(&self, media_type: &str) -> bool;

    /// Get provider name for logging
    fn name(&self) -> &str;
}

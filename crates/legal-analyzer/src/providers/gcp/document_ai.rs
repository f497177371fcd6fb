//! Google Document AI client for OCR of scanned contracts

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::auth::GcpAuth;
use crate::error::{Error, Result};
use crate::providers::ocr::OcrProvider;
use crate::types::BlobRef;

/// Media types accepted by the OCR processor
const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/tiff",
    "image/gif",
    "image/bmp",
    "image/webp",
];

/// Google Document AI client
pub struct DocumentAiClient {
    auth: Arc<GcpAuth>,
    /// Full processor resource name
    /// e.g., "projects/my-project/locations/us/processors/abc123"
    processor_name: String,
}

impl DocumentAiClient {
    pub fn new(auth: Arc<GcpAuth>, processor_name: String) -> Self {
        Self {
            auth,
            processor_name,
        }
    }

    /// Regional endpoint, derived from `projects/P/locations/LOC/processors/ID`
    fn endpoint(&self) -> String {
        let location = self.processor_name.split('/').nth(3).unwrap_or("us");
        format!(
            "https://{}-documentai.googleapis.com/v1/{}:process",
            location, self.processor_name
        )
    }

    pub fn processor_name(&self) -> &str {
        &self.processor_name
    }

    pub async fn health_check(&self) -> Result<bool> {
        self.auth.get_token().await.map(|_| true)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    raw_document: RawDocument,
    skip_human_review: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    content: String,
    mime_type: String,
}

#[derive(Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    document: Option<Document>,
}

#[derive(Deserialize)]
struct Document {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl OcrProvider for DocumentAiClient {
    async fn process(&self, blob: &BlobRef, content: &[u8]) -> Result<String> {
        if !self.supports(&blob.media_type) {
            return Err(Error::UnsupportedFileType(blob.media_type.clone()));
        }

        let client = self.auth.authorized_client().await?;
        let request = ProcessRequest {
            raw_document: RawDocument {
                content: BASE64.encode(content),
                mime_type: blob.media_type.clone(),
            },
            skip_human_review: true,
        };

        tracing::info!(
            "[{}] Sending to Document AI processor: {}",
            blob.key,
            self.processor_name
        );

        let response = client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::ocr(format!("Document AI request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ocr(format!(
                "Document AI processing failed ({}): {}",
                status, body
            )));
        }

        let process_response: ProcessResponse = response
            .json()
            .await
            .map_err(|e| Error::ocr(format!("Failed to parse Document AI response: {}", e)))?;

        // Empty text is a valid answer; the pipeline treats it as an empty document
        let text = process_response
            .document
            .and_then(|d| d.text)
            .unwrap_or_default();

        tracing::info!("[{}] Document AI extracted {} chars", blob.key, text.len());
        Ok(text)
    }

    fn supports(&self, media_type: &str) -> bool {
        let essence = media_type.split(';').next().unwrap_or("").trim();
        SUPPORTED_MEDIA_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(essence))
    }

    fn name(&self) -> &str {
        "document-ai"
    }
}

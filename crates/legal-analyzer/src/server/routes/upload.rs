//! Document upload endpoint

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;

/// Multipart field carrying the document
const FILE_FIELD: &str = "file";

/// Response for an accepted upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub doc_id: String,
    /// Always "processing"; poll the document for progress
    pub status: &'static str,
    pub message: String,
}

/// POST /api/upload - Store a document and queue it for analysis
pub async fn upload_document(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidRequest(format!("Failed to read multipart field: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidRequest(format!("Failed to read file: {}", e)))?;

        let record = state
            .service()
            .upload(&filename, content_type.as_deref(), data)
            .await?;

        return Ok(Json(UploadResponse {
            message: format!("{} uploaded; analysis started", display_name(&filename)),
            doc_id: record.id,
            status: "processing",
        }));
    }

    Err(Error::InvalidRequest(format!(
        "Missing multipart field '{}'",
        FILE_FIELD
    )))
}

fn display_name(filename: &str) -> &str {
    if filename.is_empty() {
        "Document"
    } else {
        filename
    }
}

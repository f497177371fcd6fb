//! Document status, analysis and deletion endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::error::Result;
use crate::processing::{DocumentSummary, DocumentView};
use crate::server::state::AppState;
use crate::types::AnalysisResult;

/// Response for a deletion
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub doc_id: String,
    pub deleted: bool,
    pub blobs_removed: usize,
}

/// GET /api/documents - All tracked documents, sorted by identifier
pub async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<DocumentSummary>>> {
    Ok(Json(state.service().list().await?))
}

/// GET /api/documents/:id - Status, plus the analysis once processed
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentView>> {
    Ok(Json(state.service().status_view(&id).await?))
}

/// GET /api/documents/:id/analysis - The processed artifact
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisResult>> {
    Ok(Json(state.service().analysis(&id).await?))
}

/// DELETE /api/documents/:id
pub async fn delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let blobs_removed = state.service().delete(&id).await?;
    Ok(Json(DeleteResponse {
        doc_id: id,
        deleted: true,
        blobs_removed,
    }))
}

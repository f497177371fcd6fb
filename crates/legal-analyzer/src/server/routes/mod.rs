//! API routes for the analyzer server

pub mod documents;
pub mod upload;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload - with larger body limit for documents
        .route(
            "/upload",
            post(upload::upload_document).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        // Documents
        .route("/documents", get(documents::list_documents))
        .route(
            "/documents/:id",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/documents/:id/analysis", get(documents::get_analysis))
        // Info
        .route("/info", get(info))
}

/// API info endpoint
async fn info(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "legal-analyzer",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Legal document analysis: text extraction, LLM review, status tracking",
        "providers": state.providers(),
        "max_upload_size": state.config().server.max_upload_size,
        "endpoints": {
            "POST /api/upload": "Upload a .pdf, .docx or .txt document (multipart field 'file')",
            "GET /api/documents": "List documents and their status",
            "GET /api/documents/:id": "Document status, with the analysis once processed",
            "GET /api/documents/:id/analysis": "Stored analysis",
            "DELETE /api/documents/:id": "Delete a document and its analysis"
        }
    }))
}

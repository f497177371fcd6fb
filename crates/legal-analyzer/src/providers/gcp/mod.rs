//! Google Cloud Platform provider implementations
//!
//! - Gemini (Vertex AI) for contract analysis
//! - Document AI for OCR of scanned uploads
//! - Cloud Storage for raw uploads and artifacts

mod auth;
mod document_ai;
mod gcs_store;
mod gemini_client;

pub use auth::GcpAuth;
pub use document_ai::DocumentAiClient;
pub use gcs_store::GcsBlobStore;
pub use gemini_client::GeminiClient;

//! legal-analyzer: status-tracked legal document analysis
//!
//! Uploaded documents are stored as raw blobs, their text is extracted
//! locally or through an OCR service, and an LLM reviews the text into a
//! fixed schema of summary, pros, cons and loopholes. Every stage records
//! a document status so clients can poll progress.

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod types;

pub use config::AnalyzerConfig;
pub use error::{Error, Result};
pub use types::{
    AnalysisResult, BlobRef, DocumentPhase, DocumentRecord, DocumentStatus, FileType,
    StorageLayout,
};

//! Core types for documents, statuses and analysis results

pub mod analysis;
pub mod document;

pub use analysis::AnalysisResult;
pub use document::{
    BlobRef, DocumentPhase, DocumentRecord, DocumentStatus, FileType, StorageLayout,
};

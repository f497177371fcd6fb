//! Provider abstractions for blob storage, status tracking, OCR and LLM
//!
//! Trait-based seams that allow switching between local backends and
//! Google Cloud (behind the `gcp` feature).

pub mod blob_store;
pub mod llm;
pub mod local;
pub mod ocr;
pub mod ollama;
pub mod status;

#[cfg(feature = "gcp")]
pub mod gcp;

pub use blob_store::BlobStore;
pub use llm::{GenerationConfig, GenerationRequest, TextGenerator};
pub use local::{LocalBlobStore, MemoryBlobStore, MemoryStatusStore};
pub use ocr::OcrProvider;
pub use ollama::OllamaGenerator;
pub use status::{BlobStatusStore, StatusEntry, StatusReader, StatusSink};

#[cfg(test)]
pub use llm::MockTextGenerator;
#[cfg(test)]
pub use ocr::MockOcrProvider;

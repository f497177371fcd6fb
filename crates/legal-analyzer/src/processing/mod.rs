//! Background document processing
//!
//! Provides the status-tracked pipeline, the dispatcher that runs it in the
//! background, and the document service used by the HTTP layer.

pub mod locator;
pub mod pipeline;
pub mod service;
pub mod worker;

pub use locator::DocumentLocator;
pub use pipeline::Pipeline;
pub use service::{DocumentService, DocumentSummary, DocumentView};
pub use worker::{PipelineJob, PipelineWorker};

//! LLM-backed document analysis and output normalization

pub mod client;
pub mod coercer;
pub mod prompt;

pub use client::AnalysisClient;
pub use coercer::{coerce, ResultCoercer};
pub use prompt::{PromptBuilder, SYSTEM_INSTRUCTION};

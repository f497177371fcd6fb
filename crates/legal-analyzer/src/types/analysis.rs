//! Canonical analysis schema

use serde::{Deserialize, Serialize};

/// Summary used when the document has no text
pub const EMPTY_DOCUMENT_SUMMARY: &str = "Document is empty.";
/// Summary used when the LLM call or its output could not be used
pub const FAILED_ANALYSIS_SUMMARY: &str = "Failed to analyze document.";

/// Structured review of a legal document.
///
/// All four keys are always present when serialized; list entries are never
/// empty or whitespace-only once produced by the coercer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalysisResult {
    pub summary: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub loopholes: Vec<String>,
}

impl AnalysisResult {
    /// Result for empty input (no LLM call made)
    pub fn empty_document() -> Self {
        Self {
            summary: EMPTY_DOCUMENT_SUMMARY.to_string(),
            ..Default::default()
        }
    }

    /// Result for an absorbed LLM failure
    pub fn failed() -> Self {
        Self {
            summary: FAILED_ANALYSIS_SUMMARY.to_string(),
            ..Default::default()
        }
    }

    /// Whether this is the absorbed-failure result
    pub fn is_failure(&self) -> bool {
        self.summary == FAILED_ANALYSIS_SUMMARY
            && self.pros.is_empty()
            && self.cons.is_empty()
            && self.loopholes.is_empty()
    }

    /// Pretty JSON for the processed artifact
    pub fn to_artifact(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

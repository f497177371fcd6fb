//! LLM provider trait for text generation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Sampling parameters passed to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    /// Requested response MIME type (e.g. "application/json")
    pub response_mime_type: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.8,
            max_output_tokens: 8192,
            response_mime_type: Some("application/json".to_string()),
        }
    }
}

/// A single generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Fixed instruction placed in the system slot
    pub system_instruction: String,
    /// User turn
    pub prompt: String,
    pub config: GenerationConfig,
}

/// Trait for LLM text generation
///
/// Implementations:
/// - `OllamaGenerator`: local Ollama server
/// - `GeminiClient`: Google Vertex AI (gemini-2.5-pro)
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate raw text for a request; the first candidate's text is returned
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}

//! Turns document text into a structured analysis via an LLM

use std::sync::Arc;
use std::time::Duration;

use super::coercer::ResultCoercer;
use super::prompt::{PromptBuilder, SYSTEM_INSTRUCTION};
use crate::config::AnalysisConfig;
use crate::providers::llm::{GenerationConfig, GenerationRequest, TextGenerator};
use crate::types::AnalysisResult;

/// Analysis client wrapping a text generator
///
/// `analyze` never fails: generator errors, timeouts and unparseable output
/// all degrade to a result the caller can persist.
pub struct AnalysisClient {
    generator: Arc<dyn TextGenerator>,
    coercer: ResultCoercer,
    max_input_chars: usize,
    timeout: Duration,
    generation: GenerationConfig,
}

impl AnalysisClient {
    pub fn new(generator: Arc<dyn TextGenerator>, config: &AnalysisConfig) -> Self {
        Self {
            generator,
            coercer: ResultCoercer::new(config.summary_max_chars),
            max_input_chars: config.max_input_chars,
            timeout: config.timeout(),
            generation: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                max_output_tokens: config.max_output_tokens,
                response_mime_type: Some("application/json".to_string()),
            },
        }
    }

    /// Override the per-call deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Request sent to the generator for `text`
    pub fn build_request(&self, text: &str) -> GenerationRequest {
        GenerationRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            prompt: PromptBuilder::build_user_prompt(text, self.max_input_chars),
            config: self.generation.clone(),
        }
    }

    /// Analyze document text
    pub async fn analyze(&self, text: &str) -> AnalysisResult {
        if text.trim().is_empty() {
            return AnalysisResult::empty_document();
        }

        let request = self.build_request(text);
        match tokio::time::timeout(self.timeout, self.generator.generate(&request)).await {
            Ok(Ok(raw)) => self.coercer.coerce(&raw),
            Ok(Err(e)) => {
                tracing::error!("LLM analysis failed: {}", e);
                AnalysisResult::failed()
            }
            Err(_) => {
                tracing::error!("LLM analysis timed out after {:?}", self.timeout);
                AnalysisResult::failed()
            }
        }
    }
}

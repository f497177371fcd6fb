//! Configuration for the analyzer

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::StorageLayout;

/// Main analyzer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Blob storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Text extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Text generation backend
    #[serde(default)]
    pub llm: LlmConfig,
    /// LLM analysis configuration
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Background processing configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// GCP configuration (required when storage backend = gcs or OCR is enabled)
    #[serde(default)]
    pub gcp: Option<GcpConfig>,
}

impl AnalyzerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply the deployment environment variables on top of file settings.
    ///
    /// Recognised: `PROJECT_ID`, `LOCATION`, `MODEL_ID`, `PROCESSOR_ID`,
    /// `GEMINI_KEY`, `DOC_AI_KEY`, `RAW_BUCKET`. Setting any GCP variable
    /// creates the `gcp` section if it is missing.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(bucket) = lookup("RAW_BUCKET") {
            self.storage.bucket = Some(bucket);
        }

        let project = lookup("PROJECT_ID");
        let location = lookup("LOCATION");
        let model = lookup("MODEL_ID");
        let processor = lookup("PROCESSOR_ID");
        let gemini_key = lookup("GEMINI_KEY");
        let doc_ai_key = lookup("DOC_AI_KEY");

        let any_set = [&project, &location, &model, &processor, &gemini_key, &doc_ai_key]
            .iter()
            .any(|v| v.is_some());
        if !any_set {
            return;
        }

        let gemini_key_set = gemini_key.is_some();
        let gcp = self.gcp.get_or_insert_with(GcpConfig::default);
        if let Some(v) = project {
            gcp.project_id = v;
        }
        if let Some(v) = location {
            gcp.location = v;
        }
        if let Some(v) = model {
            gcp.generation_model = v;
        }
        if gemini_key_set {
            self.llm.backend = LlmBackend::Gemini;
        }
        if let Some(v) = processor {
            gcp.document_ai_processor_id = Some(v);
        }
        if let Some(v) = gemini_key {
            gcp.gemini_key_path = Some(PathBuf::from(v));
        }
        if let Some(v) = doc_ai_key {
            gcp.service_account_key_path = Some(PathBuf::from(v));
        }
    }

    /// Check cross-section consistency
    pub fn validate(&self) -> Result<()> {
        if self.storage.backend == StorageBackend::Gcs {
            if self.gcp.is_none() {
                return Err(Error::Config(
                    "GCS storage selected but gcp config is missing".to_string(),
                ));
            }
            if self.storage.bucket.as_deref().unwrap_or("").is_empty() {
                return Err(Error::Config(
                    "GCS storage selected but storage.bucket is not set".to_string(),
                ));
            }
        }

        if self.llm.backend == LlmBackend::Gemini && self.gcp.is_none() {
            return Err(Error::Config(
                "Gemini selected but gcp config is missing".to_string(),
            ));
        }

        if self.extraction.use_ocr {
            let has_processor = self
                .gcp
                .as_ref()
                .and_then(|g| g.document_ai_processor_id.as_ref())
                .is_some();
            if !has_processor {
                return Err(Error::Config(
                    "OCR enabled but gcp.document_ai_processor_id is not set".to_string(),
                ));
            }
        }

        if self.analysis.max_input_chars == 0 {
            return Err(Error::Config("analysis.max_input_chars must be > 0".to_string()));
        }
        if self.processing.parallel_documents == Some(0) {
            return Err(Error::Config(
                "processing.parallel_documents must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 25MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            enable_cors: true,
            max_upload_size: 25 * 1024 * 1024,
        }
    }
}

/// Storage backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local map, lost on restart
    Memory,
    /// Local filesystem under `storage.local_root`
    #[default]
    Local,
    /// Google Cloud Storage bucket (requires the `gcp` feature)
    Gcs,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the local backend
    pub local_root: PathBuf,
    /// Bucket for the GCS backend
    pub bucket: Option<String>,
    /// Key prefixes
    pub layout: StorageLayout,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let local_root = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("legal-analyzer")
            .join("blobs");

        Self {
            backend: StorageBackend::default(),
            local_root,
            bucket: None,
            layout: StorageLayout::default(),
        }
    }
}

/// Text extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Timeout for extracting one document in seconds (default: 60)
    pub timeout_secs: u64,
    /// Route supported media types through Document AI (default: false)
    pub use_ocr: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            use_ocr: false,
        }
    }
}

impl ExtractionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Text generation backend selection
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    /// Local Ollama server
    #[default]
    Ollama,
    /// Gemini on Vertex AI (requires the `gcp` feature)
    Gemini,
}

/// Text generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    /// Ollama base URL
    pub base_url: String,
    /// Ollama model name
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::default(),
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1".to_string(),
        }
    }
}

/// LLM analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Input characters sent to the model; longer text is truncated
    pub max_input_chars: usize,
    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling
    pub top_p: f32,
    /// Output token cap
    pub max_output_tokens: u32,
    /// Cap on a synthesized summary when the model returns a non-string
    pub summary_max_chars: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 100_000,
            timeout_secs: 120,
            temperature: 0.0,
            top_p: 0.8,
            max_output_tokens: 8192,
            summary_max_chars: 500,
        }
    }
}

impl AnalysisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Background processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Concurrent pipeline runs (default: CPU count, max 8)
    pub parallel_documents: Option<usize>,
    /// Pending runs buffered before uploads start waiting
    pub queue_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            parallel_documents: None,
            queue_capacity: 1000,
        }
    }
}

impl ProcessingConfig {
    /// Resolved worker count
    pub fn parallelism(&self) -> usize {
        self.parallel_documents
            .unwrap_or_else(|| num_cpus::get().min(8))
            .max(1)
    }
}

/// Google Cloud Platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// Service account key used for storage and Document AI
    pub service_account_key_path: Option<PathBuf>,
    /// Service account key used for Vertex AI (falls back to the one above)
    pub gemini_key_path: Option<PathBuf>,
    /// Pre-issued bearer token, used instead of key files when set
    pub access_token: Option<String>,
    /// GCP project ID
    pub project_id: String,
    /// GCP region (e.g., "us-central1")
    pub location: String,
    /// Generation model (default: "gemini-2.5-pro")
    pub generation_model: String,
    /// Document AI processor ID
    pub document_ai_processor_id: Option<String>,
    /// Document AI multi-region ("us" or "eu")
    pub document_ai_location: String,
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            service_account_key_path: None,
            gemini_key_path: None,
            access_token: None,
            project_id: String::new(),
            location: "us-central1".to_string(),
            generation_model: "gemini-2.5-pro".to_string(),
            document_ai_processor_id: None,
            document_ai_location: "us".to_string(),
        }
    }
}

impl GcpConfig {
    /// Key for Vertex AI calls
    pub fn llm_key_path(&self) -> Option<&Path> {
        self.gemini_key_path
            .as_deref()
            .or(self.service_account_key_path.as_deref())
    }

    /// Full Document AI processor resource name
    pub fn document_ai_processor_name(&self) -> Option<String> {
        self.document_ai_processor_id.as_ref().map(|id| {
            format!(
                "projects/{}/locations/{}/processors/{}",
                self.project_id, self.document_ai_location, id
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.storage.layout.raw_prefix, "raw/");
        assert_eq!(config.analysis.summary_max_chars, 500);
        assert_eq!(config.extraction.timeout(), Duration::from_secs(60));
        assert_eq!(config.analysis.timeout(), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = AnalyzerConfig::from_toml_str(
            r#"
            [server]
            port = 9100

            [storage]
            backend = "memory"

            [analysis]
            max_input_chars = 5000
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.analysis.max_input_chars, 5000);
        assert_eq!(config.analysis.timeout_secs, 120);
    }

    #[test]
    fn test_invalid_toml() {
        let err = AnalyzerConfig::from_toml_str("server = 3").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides_create_gcp_section() {
        let vars: HashMap<&str, &str> = [
            ("PROJECT_ID", "legal-proj"),
            ("MODEL_ID", "gemini-2.5-flash"),
            ("RAW_BUCKET", "legal-ai-docs"),
            ("PROCESSOR_ID", "fc048f040d3d92d0"),
        ]
        .into_iter()
        .collect();

        let mut config = AnalyzerConfig::default();
        config.apply_overrides(|name| vars.get(name).map(|v| v.to_string()));

        let gcp = config.gcp.as_ref().unwrap();
        assert_eq!(gcp.project_id, "legal-proj");
        assert_eq!(gcp.generation_model, "gemini-2.5-flash");
        assert_eq!(gcp.location, "us-central1");
        assert_eq!(config.storage.bucket.as_deref(), Some("legal-ai-docs"));
        assert_eq!(config.llm.backend, LlmBackend::Ollama);
        assert_eq!(
            gcp.document_ai_processor_name().as_deref(),
            Some("projects/legal-proj/locations/us/processors/fc048f040d3d92d0")
        );
    }

    #[test]
    fn test_no_env_leaves_gcp_unset() {
        let mut config = AnalyzerConfig::default();
        config.apply_overrides(|_| None);
        assert!(config.gcp.is_none());
    }

    #[test]
    fn test_validate_gcs_requires_bucket() {
        let mut config = AnalyzerConfig::default();
        config.storage.backend = StorageBackend::Gcs;
        config.gcp = Some(GcpConfig::default());
        assert!(config.validate().is_err());

        config.storage.bucket = Some("bucket".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_ocr_requires_processor() {
        let mut config = AnalyzerConfig::default();
        config.extraction.use_ocr = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gemini_key_selects_gemini() {
        let mut config = AnalyzerConfig::default();
        config.apply_overrides(|name| (name == "GEMINI_KEY").then(|| "/keys/gemini.json".to_string()));
        assert_eq!(config.llm.backend, LlmBackend::Gemini);
        assert!(config.validate().is_ok());

        config.gcp = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_llm_key_falls_back() {
        let gcp = GcpConfig {
            service_account_key_path: Some(PathBuf::from("/keys/docai.json")),
            ..Default::default()
        };
        assert_eq!(gcp.llm_key_path(), Some(Path::new("/keys/docai.json")));
    }
}

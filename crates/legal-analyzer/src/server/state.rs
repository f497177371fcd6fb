//! Application state for the analyzer server

use std::sync::Arc;

use crate::analysis::AnalysisClient;
use crate::config::{AnalyzerConfig, LlmBackend, StorageBackend};
use crate::error::{Error, Result};
use crate::processing::{DocumentService, Pipeline, PipelineWorker};
use crate::providers::{
    BlobStatusStore, BlobStore, LocalBlobStore, MemoryBlobStore, MemoryStatusStore, OcrProvider,
    OllamaGenerator, StatusReader, StatusSink, TextGenerator,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AnalyzerConfig,
    service: DocumentService,
    providers: ProviderNames,
}

/// Backends in use, reported by `/api/info`
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProviderNames {
    pub storage: String,
    pub llm: String,
    pub model: String,
    pub ocr: Option<String>,
}

impl AppState {
    /// Build every provider from configuration and start the pipeline worker
    pub async fn new(config: AnalyzerConfig) -> Result<Self> {
        tracing::info!(
            "Initializing analyzer state (storage: {:?}, llm: {:?})...",
            config.storage.backend,
            config.llm.backend
        );

        let store = build_blob_store(&config).await?;
        let (status_sink, status_reader) = build_status_store(&config, store.clone());
        let generator = build_generator(&config)?;
        let ocr = build_ocr(&config)?;

        let providers = ProviderNames {
            storage: store.name().to_string(),
            llm: generator.name().to_string(),
            model: generator.model().to_string(),
            ocr: ocr.as_ref().map(|o| o.name().to_string()),
        };
        tracing::info!(
            "Providers initialized (storage: {}, llm: {} [{}], ocr: {})",
            providers.storage,
            providers.llm,
            providers.model,
            providers.ocr.as_deref().unwrap_or("disabled")
        );

        let pipeline = Arc::new(build_pipeline(
            &config,
            store.clone(),
            status_sink.clone(),
            generator,
            ocr,
        ));
        let (worker, _handle) = PipelineWorker::start(pipeline, &config.processing);

        let service = DocumentService::new(
            store,
            status_sink,
            status_reader,
            worker,
            config.storage.layout.clone(),
        );

        Ok(Self::from_service(config, service, providers))
    }

    /// Wrap an already assembled service
    pub fn from_service(
        config: AnalyzerConfig,
        service: DocumentService,
        providers: ProviderNames,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                service,
                providers,
            }),
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.inner.config
    }

    pub fn service(&self) -> &DocumentService {
        &self.inner.service
    }

    pub fn providers(&self) -> &ProviderNames {
        &self.inner.providers
    }
}

/// Blob store for `storage.backend`
pub async fn build_blob_store(config: &AnalyzerConfig) -> Result<Arc<dyn BlobStore>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryBlobStore::new())),
        StorageBackend::Local => {
            let store = LocalBlobStore::new(&config.storage.local_root)?;
            tracing::info!("Local blob store at {}", config.storage.local_root.display());
            Ok(Arc::new(store))
        }
        StorageBackend::Gcs => {
            #[cfg(feature = "gcp")]
            {
                use crate::providers::gcp::GcsBlobStore;

                let bucket = config
                    .storage
                    .bucket
                    .clone()
                    .ok_or_else(|| Error::Config("storage.bucket is not set".to_string()))?;
                let key_path = config
                    .gcp
                    .as_ref()
                    .and_then(|g| g.service_account_key_path.as_deref());
                Ok(Arc::new(GcsBlobStore::new(bucket, key_path).await?))
            }
            #[cfg(not(feature = "gcp"))]
            {
                Err(Error::Config(
                    "GCS storage selected but gcp feature is not enabled. \
                     Rebuild with --features gcp"
                        .to_string(),
                ))
            }
        }
    }
}

/// Status tracking: in process for the memory backend, beside the blobs otherwise
pub fn build_status_store(
    config: &AnalyzerConfig,
    store: Arc<dyn BlobStore>,
) -> (Arc<dyn StatusSink>, Arc<dyn StatusReader>) {
    match config.storage.backend {
        StorageBackend::Memory => {
            let statuses = Arc::new(MemoryStatusStore::new());
            (statuses.clone(), statuses)
        }
        StorageBackend::Local | StorageBackend::Gcs => {
            let statuses = Arc::new(BlobStatusStore::new(store, config.storage.layout.clone()));
            (statuses.clone(), statuses)
        }
    }
}

/// Text generator for `llm.backend`
pub fn build_generator(config: &AnalyzerConfig) -> Result<Arc<dyn TextGenerator>> {
    match config.llm.backend {
        LlmBackend::Ollama => Ok(Arc::new(OllamaGenerator::new(&config.llm))),
        LlmBackend::Gemini => {
            #[cfg(feature = "gcp")]
            {
                use crate::providers::gcp::GeminiClient;

                let gcp = config.gcp.as_ref().ok_or_else(|| {
                    Error::Config("Gemini selected but gcp config is missing".to_string())
                })?;
                let auth = gcp_auth(gcp, gcp.llm_key_path())?;
                Ok(Arc::new(GeminiClient::new(
                    auth,
                    gcp.location.clone(),
                    Some(gcp.generation_model.clone()),
                )))
            }
            #[cfg(not(feature = "gcp"))]
            {
                Err(Error::Config(
                    "Gemini selected but gcp feature is not enabled. \
                     Rebuild with --features gcp"
                        .to_string(),
                ))
            }
        }
    }
}

/// OCR provider when `extraction.use_ocr` is set
pub fn build_ocr(config: &AnalyzerConfig) -> Result<Option<Arc<dyn OcrProvider>>> {
    if !config.extraction.use_ocr {
        return Ok(None);
    }

    #[cfg(feature = "gcp")]
    {
        use crate::providers::gcp::DocumentAiClient;

        let gcp = config
            .gcp
            .as_ref()
            .ok_or_else(|| Error::Config("OCR enabled but gcp config is missing".to_string()))?;
        let processor = gcp.document_ai_processor_name().ok_or_else(|| {
            Error::Config("OCR enabled but gcp.document_ai_processor_id is not set".to_string())
        })?;
        let auth = gcp_auth(gcp, gcp.service_account_key_path.as_deref())?;
        let ocr: Arc<dyn OcrProvider> = Arc::new(DocumentAiClient::new(auth, processor));
        Ok(Some(ocr))
    }
    #[cfg(not(feature = "gcp"))]
    {
        Err(Error::Config(
            "OCR enabled but gcp feature is not enabled. Rebuild with --features gcp".to_string(),
        ))
    }
}

/// Pipeline wired with the configured timeouts and analysis settings
pub fn build_pipeline(
    config: &AnalyzerConfig,
    store: Arc<dyn BlobStore>,
    statuses: Arc<dyn StatusSink>,
    generator: Arc<dyn TextGenerator>,
    ocr: Option<Arc<dyn OcrProvider>>,
) -> Pipeline {
    let analysis = AnalysisClient::new(generator, &config.analysis);
    let pipeline = Pipeline::new(store, statuses, analysis, config.storage.layout.clone())
        .with_extraction_timeout(config.extraction.timeout());

    match ocr {
        Some(ocr) => pipeline.with_ocr(ocr),
        None => pipeline,
    }
}

#[cfg(feature = "gcp")]
fn gcp_auth(
    gcp: &crate::config::GcpConfig,
    key_path: Option<&std::path::Path>,
) -> Result<Arc<crate::providers::gcp::GcpAuth>> {
    use crate::providers::gcp::GcpAuth;

    if let Some(token) = &gcp.access_token {
        return Ok(Arc::new(GcpAuth::from_token(
            token.clone(),
            gcp.project_id.clone(),
        )));
    }
    let key_path = key_path.ok_or_else(|| {
        Error::Config("gcp.service_account_key_path or gcp.access_token is required".to_string())
    })?;
    Ok(Arc::new(GcpAuth::from_service_account(
        key_path,
        gcp.project_id.clone(),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_state() {
        let mut config = AnalyzerConfig::default();
        config.storage.backend = StorageBackend::Memory;

        let state = AppState::new(config).await.unwrap();
        assert_eq!(state.providers().storage, "memory");
        assert_eq!(state.providers().llm, "ollama");
        assert!(state.providers().ocr.is_none());
        assert!(state.service().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_state_uses_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AnalyzerConfig::default();
        config.storage.local_root = dir.path().join("blobs");

        let state = AppState::new(config).await.unwrap();
        assert_eq!(state.providers().storage, "local-filesystem");
        assert!(dir.path().join("blobs").is_dir());
    }

    #[cfg(not(feature = "gcp"))]
    #[tokio::test]
    async fn test_cloud_backends_need_feature() {
        let mut config = AnalyzerConfig::default();
        config.storage.backend = StorageBackend::Gcs;
        assert!(matches!(
            build_blob_store(&config).await.err(),
            Some(Error::Config(_))
        ));

        config.llm.backend = LlmBackend::Gemini;
        assert!(matches!(build_generator(&config).err(), Some(Error::Config(_))));

        config.extraction.use_ocr = true;
        assert!(matches!(build_ocr(&config).err(), Some(Error::Config(_))));
    }
}

//! End-to-end pipeline runs against in-memory stores

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use legal_analyzer::analysis::AnalysisClient;
use legal_analyzer::config::{AnalysisConfig, ProcessingConfig};
use legal_analyzer::processing::{DocumentService, Pipeline, PipelineWorker};
use legal_analyzer::providers::{
    BlobStore, GenerationRequest, MemoryBlobStore, MemoryStatusStore, StatusReader, StatusSink,
    TextGenerator,
};
use legal_analyzer::{AnalysisResult, DocumentPhase, DocumentStatus, Error, Result, StorageLayout};

/// Replies with a fixed body and remembers every prompt it saw
struct ScriptedGenerator {
    reply: std::result::Result<String, String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        self.prompts.lock().push(request.prompt.clone());
        self.reply.clone().map_err(Error::llm)
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "fixture"
    }
}

struct Fixture {
    store: Arc<MemoryBlobStore>,
    statuses: Arc<MemoryStatusStore>,
    pipeline: Pipeline,
}

impl Fixture {
    /// Store a raw blob and record the document as uploaded, as an upload does
    async fn upload(&self, id: &str, extension: &str, data: &'static [u8]) {
        self.store
            .put(
                &format!("raw/{}{}", id, extension),
                Bytes::from_static(data),
                "text/plain",
            )
            .await
            .unwrap();
        self.statuses
            .update(id, DocumentStatus::Uploaded)
            .await
            .unwrap();
    }
}

fn fixture(generator: Arc<ScriptedGenerator>) -> Fixture {
    let store = Arc::new(MemoryBlobStore::new());
    let statuses = Arc::new(MemoryStatusStore::new());
    let pipeline = Pipeline::new(
        store.clone(),
        statuses.clone(),
        AnalysisClient::new(generator, &AnalysisConfig::default()),
        StorageLayout::default(),
    );
    Fixture {
        store,
        statuses,
        pipeline,
    }
}

#[tokio::test]
async fn at_will_clause_is_analyzed_and_persisted() {
    let generator = ScriptedGenerator::replying(
        r#"{"summary":"At-will termination clause.","pros":[],"cons":["One-sided"],"loopholes":[]}"#,
    );
    let fx = fixture(generator.clone());
    fx.upload("doc-1", ".txt", b"Employer may terminate at will.")
        .await;

    let status = fx.pipeline.run("doc-1", Some("text/plain")).await;
    assert_eq!(status, DocumentStatus::Processed);
    assert_eq!(
        fx.statuses.history("doc-1"),
        vec![
            DocumentStatus::Uploaded,
            DocumentStatus::ExtractingText,
            DocumentStatus::Analyzing,
            DocumentStatus::Processed
        ]
    );

    let artifact = fx.store.get("processed/doc-1.json").await.unwrap();
    let stored: AnalysisResult = serde_json::from_slice(&artifact).unwrap();
    assert_eq!(
        stored,
        AnalysisResult {
            summary: "At-will termination clause.".to_string(),
            pros: vec![],
            cons: vec!["One-sided".to_string()],
            loopholes: vec![],
        }
    );
    assert_eq!(generator.calls(), 1);
    assert!(generator.prompts.lock()[0].contains("Employer may terminate at will."));
}

#[tokio::test]
async fn llm_outage_still_produces_an_artifact() {
    let fx = fixture(ScriptedGenerator::failing("503 Service Unavailable"));
    fx.upload("doc-2", ".txt", b"Section 4. Indemnity.").await;

    assert_eq!(fx.pipeline.run("doc-2", None).await, DocumentStatus::Processed);

    let artifact = fx.store.get("processed/doc-2.json").await.unwrap();
    let stored: AnalysisResult = serde_json::from_slice(&artifact).unwrap();
    assert!(stored.is_failure());
}

#[tokio::test]
async fn blank_document_never_reaches_the_llm() {
    let generator = ScriptedGenerator::replying("{}");
    let fx = fixture(generator.clone());
    fx.upload("doc-3", ".txt", b" \n\t ").await;

    assert_eq!(
        fx.pipeline.run("doc-3", None).await,
        DocumentStatus::ErrorEmptyDocument
    );
    assert_eq!(generator.calls(), 0);
    assert!(!fx.store.exists("processed/doc-3.json").await.unwrap());
}

#[tokio::test]
async fn missing_blob_fails_processing() {
    let fx = fixture(ScriptedGenerator::replying("{}"));
    fx.statuses
        .update("ghost", DocumentStatus::Uploaded)
        .await
        .unwrap();

    assert_eq!(
        fx.pipeline.run("ghost", None).await,
        DocumentStatus::ErrorProcessingFailed
    );
    let entry = fx.statuses.get("ghost").await.unwrap().unwrap();
    assert_eq!(entry.status.phase(), DocumentPhase::Error);
}

#[tokio::test]
async fn service_upload_runs_in_background() {
    let generator = ScriptedGenerator::replying(
        "```json\n{\"summary\": \"Lease.\", \"loopholes\": [\"No notice period\", \"\"]}\n```",
    );
    let store = Arc::new(MemoryBlobStore::new());
    let statuses = Arc::new(MemoryStatusStore::new());
    let layout = StorageLayout::default();
    let pipeline = Arc::new(Pipeline::new(
        store.clone(),
        statuses.clone(),
        AnalysisClient::new(generator, &AnalysisConfig::default()),
        layout.clone(),
    ));
    let (worker, _handle) = PipelineWorker::start(pipeline, &ProcessingConfig::default());
    let service = DocumentService::new(store, statuses.clone(), statuses, worker, layout);

    let record = service
        .upload("lease.txt", Some("text/plain"), Bytes::from_static(b"The tenant pays rent."))
        .await
        .unwrap();

    let mut view = service.status_view(&record.id).await.unwrap();
    for _ in 0..200 {
        if view.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        view = service.status_view(&record.id).await.unwrap();
    }

    assert_eq!(view.phase, DocumentPhase::Processed);
    let result = view.result.unwrap();
    assert_eq!(result.summary, "Lease.");
    assert_eq!(result.loopholes, vec!["No notice period"]);
    assert!(result.pros.is_empty());
}

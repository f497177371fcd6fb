//! Background dispatcher for pipeline runs

use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use super::pipeline::Pipeline;
use crate::config::ProcessingConfig;
use crate::error::{Error, Result};

/// A document waiting to be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineJob {
    pub id: String,
    /// Media type declared at upload
    pub media_type: Option<String>,
}

/// Handle for submitting documents to the background dispatcher
#[derive(Clone)]
pub struct PipelineWorker {
    sender: mpsc::Sender<PipelineJob>,
}

impl PipelineWorker {
    /// Start the dispatcher on the current runtime
    pub fn start(pipeline: Arc<Pipeline>, config: &ProcessingConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let parallel = config.parallelism();

        tracing::info!(
            "Pipeline worker configured: {} parallel documents, queue capacity {}",
            parallel,
            config.queue_capacity
        );

        let handle = tokio::spawn(dispatch(pipeline, receiver, parallel));
        (Self { sender }, handle)
    }

    /// Queue a run without waiting.
    ///
    /// Fails with [`Error::QueueFull`] when the queue is at capacity and
    /// with [`Error::Internal`] once the dispatcher has stopped.
    pub fn submit(&self, job: PipelineJob) -> Result<()> {
        let id = job.id.clone();
        match self.sender.try_send(job) {
            Ok(()) => {
                tracing::debug!("[{}] Queued for processing", id);
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(Error::QueueFull(format!(
                "Processing queue is full; cannot queue {}",
                id
            ))),
            Err(TrySendError::Closed(_)) => Err(Error::internal(format!(
                "Pipeline worker stopped; cannot queue {}",
                id
            ))),
        }
    }
}

/// Receive jobs and spawn each run at once.
///
/// Runs wait for a permit inside their own task, so at most `parallel`
/// execute at a time and the queue keeps draining while they do.
async fn dispatch(pipeline: Arc<Pipeline>, mut receiver: mpsc::Receiver<PipelineJob>, parallel: usize) {
    let semaphore = Arc::new(Semaphore::new(parallel));

    while let Some(job) = receiver.recv().await {
        let semaphore = semaphore.clone();
        let pipeline = pipeline.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            pipeline.run(&job.id, job.media_type.as_deref()).await;
        });
    }

    tracing::info!("Pipeline worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisClient;
    use crate::config::AnalysisConfig;
    use crate::providers::llm::MockTextGenerator;
    use crate::providers::{
        BlobStore, GenerationRequest, MemoryBlobStore, MemoryStatusStore, StatusReader, StatusSink,
        TextGenerator,
    };
    use async_trait::async_trait;
    use crate::types::{DocumentStatus, StorageLayout};
    use bytes::Bytes;
    use std::time::Duration;

    async fn wait_for_terminal(statuses: &MemoryStatusStore, id: &str) -> DocumentStatus {
        for _ in 0..200 {
            if let Some(entry) = statuses.get(id).await.unwrap() {
                if entry.status.is_terminal() {
                    return entry.status;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("{} never reached a terminal status", id);
    }

    #[tokio::test]
    async fn test_submitted_jobs_are_processed() {
        let store = Arc::new(MemoryBlobStore::new());
        let statuses = Arc::new(MemoryStatusStore::new());
        for id in ["a", "b", "c"] {
            statuses.update(id, DocumentStatus::Uploaded).await.unwrap();
            store
                .put(
                    &format!("raw/{}.txt", id),
                    Bytes::from_static(b"Lessee shall maintain insurance."),
                    "text/plain",
                )
                .await
                .unwrap();
        }

        let mut generator = MockTextGenerator::new();
        generator
            .expect_generate()
            .times(3)
            .returning(|_| Ok(r#"{"summary": "Insurance clause."}"#.to_string()));

        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            statuses.clone(),
            AnalysisClient::new(Arc::new(generator), &AnalysisConfig::default()),
            StorageLayout::default(),
        ));
        let config = ProcessingConfig {
            parallel_documents: Some(2),
            queue_capacity: 4,
        };
        let (worker, _handle) = PipelineWorker::start(pipeline, &config);

        for id in ["a", "b", "c"] {
            worker
                .submit(PipelineJob {
                    id: id.to_string(),
                    media_type: Some("text/plain".to_string()),
                })
                .unwrap();
        }

        for id in ["a", "b", "c"] {
            assert_eq!(wait_for_terminal(&statuses, id).await, DocumentStatus::Processed);
            assert!(store.exists(&format!("processed/{}.json", id)).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_fails() {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryStatusStore::new()),
            AnalysisClient::new(Arc::new(MockTextGenerator::new()), &AnalysisConfig::default()),
            StorageLayout::default(),
        ));
        let (worker, handle) = PipelineWorker::start(pipeline, &ProcessingConfig::default());
        handle.abort();
        let _ = handle.await;

        let err = worker
            .submit(PipelineJob {
                id: "late".to_string(),
                media_type: None,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[tokio::test]
    async fn test_full_queue_fails_fast() {
        let (sender, _receiver) = mpsc::channel(1);
        let worker = PipelineWorker { sender };
        let job = |id: &str| PipelineJob {
            id: id.to_string(),
            media_type: None,
        };

        worker.submit(job("first")).unwrap();
        let err = worker.submit(job("second")).unwrap_err();
        assert!(matches!(err, Error::QueueFull(_)));
    }

    /// Holds every call until the test hands out permits
    struct GatedGenerator {
        gate: Arc<Semaphore>,
    }

    #[async_trait]
    impl TextGenerator for GatedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String> {
            self.gate
                .acquire()
                .await
                .map_err(|e| Error::internal(e.to_string()))?
                .forget();
            Ok(r#"{"summary": "Gated."}"#.to_string())
        }

        fn name(&self) -> &str {
            "gated"
        }

        fn model(&self) -> &str {
            "gate"
        }
    }

    #[tokio::test]
    async fn test_busy_runs_do_not_block_submit() {
        let store = Arc::new(MemoryBlobStore::new());
        let statuses = Arc::new(MemoryStatusStore::new());
        let ids = ["a", "b", "c", "d"];
        for id in ids {
            statuses.update(id, DocumentStatus::Uploaded).await.unwrap();
            store
                .put(
                    &format!("raw/{}.txt", id),
                    Bytes::from_static(b"Either party may terminate."),
                    "text/plain",
                )
                .await
                .unwrap();
        }

        let gate = Arc::new(Semaphore::new(0));
        let pipeline = Arc::new(Pipeline::new(
            store.clone(),
            statuses.clone(),
            AnalysisClient::new(
                Arc::new(GatedGenerator { gate: gate.clone() }),
                &AnalysisConfig::default(),
            ),
            StorageLayout::default(),
        ));
        let config = ProcessingConfig {
            parallel_documents: Some(1),
            queue_capacity: 1,
        };
        let (worker, _handle) = PipelineWorker::start(pipeline, &config);

        // One run holds the only permit while the rest are accepted
        for id in ids {
            worker
                .submit(PipelineJob {
                    id: id.to_string(),
                    media_type: None,
                })
                .unwrap();
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
        }

        gate.add_permits(ids.len());
        for id in ids {
            assert_eq!(wait_for_terminal(&statuses, id).await, DocumentStatus::Processed);
        }
    }
}

//! Job supervision and the embed-and-store pipeline.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use quorum_rag::embeddings::EmbeddingsClient;
use quorum_rag::store::VectorStore;

use crate::ledger::JobLedger;
use crate::SourceChunk;

/// Terminal payload of a successful job.
pub struct JobOutcome {
    pub message: String,
    pub source_id: Option<String>,
    pub chunk_count: usize,
}

/// Terminal payload of a failed job.
#[derive(Debug)]
pub struct JobFailure {
    pub message: String,
    pub error: String,
}

impl JobFailure {
    pub fn new(message: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            message: message.into(),
            error: error.to_string(),
        }
    }
}

/// A source that can be fetched and split into embeddable chunks.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    /// Source kind as stored, e.g. `"youtube"` or `"pdf"`.
    fn source_type(&self) -> &str;

    /// Stable identifier for duplicate detection.
    fn source_id(&self) -> &str;

    async fn fetch(&self) -> anyhow::Result<Vec<SourceChunk>>;
}

/// Run `work` detached from the originating request and guarantee the
/// ledger ends in a terminal state, whether the worker returns an
/// error or panics.
pub fn spawn_job<F>(ledger: Arc<JobLedger>, job_id: String, work: F)
where
    F: Future<Output = Result<JobOutcome, JobFailure>> + Send + 'static,
{
    tokio::spawn(async move {
        let worker = tokio::spawn(work);
        match worker.await {
            Ok(Ok(outcome)) => {
                info!(job_id = %job_id, chunks = outcome.chunk_count, "Job completed");
                ledger.complete(
                    &job_id,
                    &outcome.message,
                    outcome.source_id,
                    outcome.chunk_count,
                );
            }
            Ok(Err(failure)) => {
                error!(job_id = %job_id, error = %failure.error, "Job failed");
                ledger.fail(&job_id, &failure.message, &failure.error);
            }
            Err(join_err) => {
                error!(job_id = %job_id, %join_err, "Job crashed");
                ledger.fail(&job_id, "Processing crashed", &join_err.to_string());
            }
        }
    });
}

/// Shared embed-and-store pipeline for all source kinds.
pub struct IngestPipeline {
    embeddings: Arc<EmbeddingsClient>,
    store: Arc<VectorStore>,
    ledger: Arc<JobLedger>,
}

impl IngestPipeline {
    pub fn new(
        embeddings: Arc<EmbeddingsClient>,
        store: Arc<VectorStore>,
        ledger: Arc<JobLedger>,
    ) -> Self {
        Self {
            embeddings,
            store,
            ledger,
        }
    }

    /// Fetch, chunk, embed, and store one source. Progress is written
    /// to the ledger per chunk so status polls see movement.
    pub async fn run(
        &self,
        job_id: &str,
        source: &dyn ChunkSource,
        session_info: &str,
    ) -> Result<JobOutcome, JobFailure> {
        let source_type = source.source_type();
        let source_id = source.source_id();

        if let Some(existing) = self
            .store
            .find_source(source_type, source_id)
            .await
            .map_err(|e| JobFailure::new("Duplicate check failed", e))?
        {
            return Err(JobFailure::new(
                "Source already processed",
                format!("{source_type} source '{source_id}' already ingested as {existing}"),
            ));
        }

        self.ledger
            .progress(job_id, &format!("Fetching {source_type} content"), None);
        let chunks = source
            .fetch()
            .await
            .map_err(|e| JobFailure::new("Content extraction failed", e))?;
        if chunks.is_empty() {
            return Err(JobFailure::new(
                "Content extraction failed",
                format!("no usable content in {source_type} source '{source_id}'"),
            ));
        }

        let source_uuid = self
            .store
            .insert_source(source_type, source_id, session_info, 0)
            .await
            .map_err(|e| JobFailure::new("Source registration failed", e))?;

        let total = chunks.len();
        for (idx, chunk) in chunks.iter().enumerate() {
            self.ledger.progress(
                job_id,
                &format!("Embedding chunk {}/{total}", idx + 1),
                Some(idx),
            );

            let embedding = self
                .embeddings
                .embed(&chunk.text)
                .await
                .map_err(|e| JobFailure::new("Embedding failed", e))?;
            self.store
                .insert_embedding(&source_uuid, &chunk.text, &chunk.timestamp, &embedding)
                .await
                .map_err(|e| JobFailure::new("Storage failed", e))?;
        }

        self.store
            .update_chunk_count(&source_uuid, total)
            .await
            .map_err(|e| JobFailure::new("Chunk count update failed", e))?;

        Ok(JobOutcome {
            message: format!("Processed {total} chunks from {source_type} source"),
            source_id: Some(source_uuid),
            chunk_count: total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::JobStatus;
    use std::time::Duration;

    async fn wait_terminal(ledger: &JobLedger, id: &str) -> crate::Job {
        for _ in 0..200 {
            if let Some(job) = ledger.get(id) {
                if job.status.is_terminal() {
                    return job;
                }
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("job never reached a terminal state");
    }

    #[tokio::test]
    async fn test_spawn_job_success_writes_completed() {
        let ledger = Arc::new(JobLedger::new());
        let id = ledger.submit("start");

        spawn_job(ledger.clone(), id.clone(), async {
            Ok(JobOutcome {
                message: "done".into(),
                source_id: Some("s".into()),
                chunk_count: 4,
            })
        });

        let job = wait_terminal(&ledger, &id).await;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.chunk_count, Some(4));
    }

    #[tokio::test]
    async fn test_spawn_job_error_writes_failed() {
        let ledger = Arc::new(JobLedger::new());
        let id = ledger.submit("start");

        spawn_job(ledger.clone(), id.clone(), async {
            Err(JobFailure::new("Processing failed", "no transcript"))
        });

        let job = wait_terminal(&ledger, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("no transcript"));
    }

    #[tokio::test]
    async fn test_spawn_job_panic_writes_failed() {
        let ledger = Arc::new(JobLedger::new());
        let id = ledger.submit("start");

        spawn_job(ledger.clone(), id.clone(), async {
            panic!("worker blew up");
            #[allow(unreachable_code)]
            Ok(JobOutcome {
                message: String::new(),
                source_id: None,
                chunk_count: 0,
            })
        });

        let job = wait_terminal(&ledger, &id).await;
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("panic"));
    }
}

//! In-process job ledger.
//!
//! Every job starts `processing` and ends in exactly one terminal
//! write, `completed` or `failed`. Updates arriving after a terminal
//! write are ignored; the ledger is the single source of truth for
//! status polling.

use std::collections::HashMap;
use std::sync::Mutex;

use quorum_core::types::JobStatusResponse;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    pub message: String,
    pub source_id: Option<String>,
    pub chunk_count: Option<usize>,
    pub error: Option<String>,
}

impl Job {
    pub fn to_response(&self) -> JobStatusResponse {
        JobStatusResponse {
            job_id: self.id.clone(),
            status: self.status.as_str().into(),
            message: self.message.clone(),
            source_id: self.source_id.clone(),
            chunk_count: self.chunk_count,
            error: self.error.clone(),
        }
    }
}

/// Thread-safe registry of ingestion jobs. Entries are kept for the
/// lifetime of the process; the job population is operator-bounded.
#[derive(Default)]
pub struct JobLedger {
    jobs: Mutex<HashMap<String, Job>>,
}

impl JobLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in `processing` state; returns its id.
    pub fn submit(&self, message: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let job = Job {
            id: id.clone(),
            status: JobStatus::Processing,
            message: message.to_string(),
            source_id: None,
            chunk_count: None,
            error: None,
        };
        self.jobs.lock().unwrap().insert(id.clone(), job);
        id
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.lock().unwrap().get(id).cloned()
    }

    /// Record in-flight progress. No-op on unknown or terminal jobs.
    pub fn progress(&self, id: &str, message: &str, chunk_count: Option<usize>) {
        self.mutate(id, |job| {
            job.message = message.to_string();
            if chunk_count.is_some() {
                job.chunk_count = chunk_count;
            }
        });
    }

    /// Terminal success write.
    pub fn complete(&self, id: &str, message: &str, source_id: Option<String>, chunk_count: usize) {
        self.mutate(id, |job| {
            job.status = JobStatus::Completed;
            job.message = message.to_string();
            job.source_id = source_id;
            job.chunk_count = Some(chunk_count);
        });
    }

    /// Terminal failure write.
    pub fn fail(&self, id: &str, message: &str, error: &str) {
        self.mutate(id, |job| {
            job.status = JobStatus::Failed;
            job.message = message.to_string();
            job.error = Some(error.to_string());
        });
    }

    fn mutate(&self, id: &str, apply: impl FnOnce(&mut Job)) {
        let mut jobs = self.jobs.lock().unwrap();
        match jobs.get_mut(id) {
            Some(job) if job.status.is_terminal() => {
                warn!(job_id = %id, status = job.status.as_str(), "Update to terminal job ignored");
            }
            Some(job) => apply(job),
            None => warn!(job_id = %id, "Update to unknown job ignored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_starts_processing() {
        let ledger = JobLedger::new();
        let id = ledger.submit("YouTube processing started");

        let job = ledger.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.message, "YouTube processing started");
        assert!(job.source_id.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn test_progress_then_complete() {
        let ledger = JobLedger::new();
        let id = ledger.submit("start");

        ledger.progress(&id, "Embedding chunk 3/10", Some(3));
        let job = ledger.get(&id).unwrap();
        assert_eq!(job.chunk_count, Some(3));

        ledger.complete(&id, "done", Some("src-1".into()), 10);
        let job = ledger.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.chunk_count, Some(10));
        assert_eq!(job.source_id.as_deref(), Some("src-1"));
    }

    #[test]
    fn test_post_terminal_updates_ignored() {
        let ledger = JobLedger::new();
        let id = ledger.submit("start");

        ledger.fail(&id, "broke", "boom");
        ledger.progress(&id, "late progress", Some(99));
        ledger.complete(&id, "late complete", None, 5);

        let job = ledger.get(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.message, "broke");
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(job.chunk_count.is_none());
    }

    #[test]
    fn test_unknown_job() {
        let ledger = JobLedger::new();
        assert!(ledger.get("nope").is_none());
        // Must not panic
        ledger.progress("nope", "msg", None);
        ledger.fail("nope", "msg", "err");
    }

    #[test]
    fn test_ids_unique() {
        let ledger = JobLedger::new();
        let a = ledger.submit("a");
        let b = ledger.submit("b");
        assert_ne!(a, b);
    }
}

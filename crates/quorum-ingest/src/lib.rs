//! Background ingestion: transcripts and slide decks are chunked,
//! embedded, and stored while the originating request returns
//! immediately with a job id.

pub mod ledger;
pub mod pdf;
pub mod worker;
pub mod youtube;

pub use ledger::{Job, JobLedger, JobStatus};
pub use worker::{spawn_job, IngestPipeline, JobFailure, JobOutcome};

/// One embeddable unit of source material.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceChunk {
    pub text: String,
    /// Position label inside the source, e.g. `12:34` or `Slide 3`.
    pub timestamp: String,
}

use thiserror::Error;

/// Error taxonomy for the Quorum backend.
///
/// Handlers map these onto HTTP status codes; see `quorum-server`.
#[derive(Debug, Error)]
pub enum Error {
    /// Too many requests from one client identity within the window.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("{0} not found")]
    NotFound(String),

    /// A required external integration has no credentials configured.
    /// Raised at request time so misconfiguration is loud, not silent.
    #[error("{0} is not configured")]
    Unconfigured(String),

    /// An embedding/LLM/database/events backend call failed. Surfaced
    /// to callers as a generic internal error; detail goes to the log.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("invalid or missing API key")]
    Unauthorized,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

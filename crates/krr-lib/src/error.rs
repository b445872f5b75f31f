//! Error taxonomy for recommendation passes

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecommendError>;

#[derive(Debug, Error)]
pub enum RecommendError {
    /// Transport failure, timeout or error response from the monitoring backend
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// The backend answered with an unexpected shape
    #[error("malformed result: {0}")]
    MalformedResult(String),

    /// A query returned zero usable samples
    #[error("no data returned for query: {0}")]
    NoData(String),

    /// The pass was aborted by a shutdown signal
    #[error("recommendation pass cancelled")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A per-workload task panicked or was aborted unexpectedly
    #[error("workload task failed: {0}")]
    TaskFailed(String),
}

impl RecommendError {
    /// Errors that prevent the workload universe from being enumerated
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            RecommendError::BackendUnavailable(_) | RecommendError::MalformedResult(_)
        )
    }
}

impl From<reqwest::Error> for RecommendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RecommendError::MalformedResult(err.to_string())
        } else {
            RecommendError::BackendUnavailable(err.to_string())
        }
    }
}

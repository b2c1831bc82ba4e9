//! Worker error types.

use std::time::Duration;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Render timed out after {0:?}")]
    Timeout(Duration),

    #[error("Render error: {0}")]
    Media(#[from] mocap_media::MediaError),

    #[error("Store error: {0}")]
    Queue(#[from] mocap_queue::QueueError),

    #[error("{0}")]
    ArtifactCount(#[from] mocap_models::ArtifactCountMismatch),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Text stored as the job's failure detail.
    pub fn detail(&self) -> String {
        match self {
            WorkerError::Media(e) => e.detail(),
            other => other.to_string(),
        }
    }
}

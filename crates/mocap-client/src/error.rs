//! Client error types.

use std::time::Duration;

use mocap_models::{ArtifactCountMismatch, RotationParseError, StatusError};
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Every variant ends the run; nothing is recovered locally.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Render request rejected ({status}): {body}")]
    Submission { status: u16, body: String },

    #[error("Status request failed ({status}): {body}")]
    Poll { status: u16, body: String },

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Render job failed: {0}")]
    JobFailed(String),

    #[error("Failed to retrieve {locator}: {reason}")]
    Retrieval { locator: String, reason: String },

    #[error("Artifact naming mismatch: {0}")]
    ArtifactCount(#[from] ArtifactCountMismatch),

    #[error("No terminal status after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn retrieval(locator: impl Into<String>, reason: impl ToString) -> Self {
        Self::Retrieval {
            locator: locator.into(),
            reason: reason.to_string(),
        }
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Network(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

impl From<StatusError> for ClientError {
    fn from(e: StatusError) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<RotationParseError> for ClientError {
    fn from(e: RotationParseError) -> Self {
        Self::Input(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_errors_are_not_retryable() {
        let err = ClientError::from(StatusError::UnknownPhase("X".to_string()));
        assert!(matches!(err, ClientError::Protocol(_)));
        assert!(!err.is_retryable());
        assert!(!ClientError::JobFailed("boom".to_string()).is_retryable());
        assert!(!ClientError::Poll {
            status: 503,
            body: String::new()
        }
        .is_retryable());
    }

    #[test]
    fn test_failure_detail_is_kept_verbatim() {
        let err = ClientError::JobFailed("render crashed".to_string());
        assert!(err.to_string().contains("render crashed"));
    }
}

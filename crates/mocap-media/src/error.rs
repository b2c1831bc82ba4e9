//! Error types for render operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for render operations.
pub type MediaResult<T> = Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Blender not found: {0}")]
    BlenderNotFound(String),

    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("Blender failed: {message}")]
    BlenderFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Render produced no output file for view {0}")]
    MissingOutput(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn blender_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::BlenderFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Message suitable for a job's failure detail: includes the tail of the
    /// tool's stderr when there is one.
    pub fn detail(&self) -> String {
        match self {
            MediaError::BlenderFailed {
                stderr: Some(stderr),
                ..
            }
            | MediaError::FfmpegFailed {
                stderr: Some(stderr),
                ..
            } if !stderr.trim().is_empty() => format!("{}\n{}", self, stderr.trim()),
            _ => self.to_string(),
        }
    }
}

//! Shared data models for the mocap render service.
//!
//! This crate provides Serde-serializable types for:
//! - Job submissions (rotation mode) and identifiers
//! - The job phase vocabulary and the status document exchanged while polling
//! - Result artifact naming

pub mod artifact;
pub mod job;
pub mod rotation;
pub mod status;

// Re-export common types
pub use artifact::{ArtifactCountMismatch, ArtifactNaming};
pub use job::{JobId, JobPhase};
pub use rotation::{RotationMode, RotationParseError};
pub use status::{JobStatus, RenderProgress, StatusDocument, StatusError};

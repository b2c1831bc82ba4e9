//! Polling client for the mocap render service.
//!
//! A render runs in three steps against the server:
//! - submit the BVH clip (and optional audio) and receive a status path
//! - poll that path until the job reaches `SUCCESS` or `FAILURE`
//! - download every result video into a local directory
//!
//! [`RenderClient::render`] chains all three.

pub mod client;
pub mod config;
pub mod error;
pub mod progress;
pub mod submission;

#[cfg(test)]
mod client_tests;

pub use client::RenderClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use progress::{describe, LogReporter, ProgressReporter};
pub use submission::JobSubmission;

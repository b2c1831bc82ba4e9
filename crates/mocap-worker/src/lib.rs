//! Render job worker.
//!
//! This crate provides:
//! - The job executor draining the render queue with bounded concurrency
//! - Per-job processing that drives the job's phases in the store
//! - Placement of finished videos under their download names
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;

#[cfg(test)]
mod test_support;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use processor::JobProcessor;

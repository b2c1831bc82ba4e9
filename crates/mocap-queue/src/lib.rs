//! Job state store and render queue.
//!
//! This crate provides:
//! - `JobRecord`, the server-side view of a render job
//! - `JobStore`, monotonic phase bookkeeping backed by memory or Redis
//! - `JobQueue`, the FIFO of jobs waiting for a worker

pub mod error;
pub mod job;
pub mod queue;
pub mod store;

pub use error::{QueueError, QueueResult};
pub use job::{JobRecord, RenderJob};
pub use queue::JobQueue;
pub use store::{JobStore, StoreBackend, StoreConfig, JOB_RECORD_TTL_SECS};

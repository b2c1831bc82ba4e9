//! Application state.

use mocap_queue::{JobQueue, JobStore};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub store: JobStore,
    pub queue: JobQueue,
}

impl AppState {
    pub fn new(config: ApiConfig, store: JobStore, queue: JobQueue) -> Self {
        Self {
            config,
            store,
            queue,
        }
    }
}

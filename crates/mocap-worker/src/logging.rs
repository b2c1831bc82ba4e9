//! Structured job logging.

use mocap_models::{JobId, JobPhase};
use tracing::{error, info, warn, Span};

/// Job logger carrying the job id on every line.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    backend: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, backend: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            backend,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, backend = self.backend, "Job started: {}", message);
    }

    /// Log a phase change.
    pub fn log_phase(&self, phase: JobPhase) {
        info!(job_id = %self.job_id, backend = self.backend, phase = %phase, "Job entered {}", phase);
    }

    pub fn log_progress(&self, current: u64, total: u64) {
        tracing::debug!(
            job_id = %self.job_id,
            backend = self.backend,
            current,
            total,
            "Rendered {}/{} frames", current, total
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, backend = self.backend, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, backend = self.backend, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, backend = self.backend, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span wrapping all work done for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, backend = self.backend)
    }
}

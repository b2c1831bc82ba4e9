//! Operator-facing progress reporting.

use mocap_models::JobStatus;
use tracing::info;

/// Receives every status observed while polling, in order.
pub trait ProgressReporter {
    fn report(&mut self, status: &JobStatus);
}

impl<F> ProgressReporter for F
where
    F: FnMut(&JobStatus),
{
    fn report(&mut self, status: &JobStatus) {
        self(status)
    }
}

/// Writes one log line per observed status.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ProgressReporter for LogReporter {
    fn report(&mut self, status: &JobStatus) {
        info!(phase = %status.phase(), "{}", describe(status));
    }
}

/// Human-readable line for a status. The rendering percentage is computed
/// from the counters of this status alone.
pub fn describe(status: &JobStatus) -> String {
    match status {
        JobStatus::Pending { jobs_in_queue } => {
            format!("Pending: {} jobs currently in queue", jobs_in_queue)
        }
        JobStatus::Processing => {
            "Processing the motion file (this can take a while for long clips)".to_string()
        }
        JobStatus::Rendering(progress) => format!(
            "Rendering: {}% done ({}/{} frames)",
            progress.percent(),
            progress.current,
            progress.total
        ),
        JobStatus::CombiningAv => "Combining audio with video, almost done".to_string(),
        JobStatus::Success { files } => format!("Done, {} video(s) ready", files.len()),
        JobStatus::Failure { error_detail } => format!("Render failed: {}", error_detail),
    }
}

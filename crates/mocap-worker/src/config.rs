//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use mocap_models::ArtifactNaming;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Limit for one whole job, render and mux included
    pub job_timeout: Duration,
    /// How long shutdown waits for in-flight jobs
    pub shutdown_timeout: Duration,
    /// Scratch space; each job gets `{work_dir}/{job_id}`
    pub work_dir: PathBuf,
    /// Finished videos land in `{output_dir}/{job_id}`
    pub output_dir: PathBuf,
    /// Names of the finished videos, one suffix per camera view
    pub naming: ArtifactNaming,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(3600), // 1 hour
            shutdown_timeout: Duration::from_secs(30),
            work_dir: PathBuf::from("/tmp/mocap-render/work"),
            output_dir: PathBuf::from("/tmp/mocap-render/output"),
            naming: ArtifactNaming::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            job_timeout: std::env::var("WORKER_JOB_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.job_timeout),
            shutdown_timeout: std::env::var("WORKER_SHUTDOWN_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.shutdown_timeout),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            naming: defaults.naming,
        }
    }

    /// Scratch directory of one job.
    pub fn job_work_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(job_id)
    }

    /// Directory holding one job's finished videos.
    pub fn job_output_dir(&self, job_id: &str) -> PathBuf {
        self.output_dir.join(job_id)
    }
}

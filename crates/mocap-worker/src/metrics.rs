//! Job metrics recorded by the worker.

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const JOBS_STARTED_TOTAL: &str = "mocap_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "mocap_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "mocap_jobs_failed_total";
    pub const JOBS_IN_FLIGHT: &str = "mocap_jobs_in_flight";
    pub const JOB_DURATION_SECONDS: &str = "mocap_job_duration_seconds";
}

pub fn record_job_started(backend: &'static str) {
    counter!(names::JOBS_STARTED_TOTAL, "backend" => backend).increment(1);
}

pub fn record_job_completed(backend: &'static str, duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL, "backend" => backend).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "backend" => backend).record(duration_secs);
}

pub fn record_job_failed(backend: &'static str, reason: &'static str) {
    counter!(names::JOBS_FAILED_TOTAL, "backend" => backend, "reason" => reason).increment(1);
}

pub fn set_jobs_in_flight(count: usize) {
    gauge!(names::JOBS_IN_FLIGHT).set(count as f64);
}

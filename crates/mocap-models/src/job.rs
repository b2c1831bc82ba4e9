//! Job identifiers and the phase vocabulary.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a render job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Status path handed back to the submitter.
    pub fn status_path(&self) -> String {
        format!("/status/{}", self.0)
    }

    /// Download path for one of this job's artifacts.
    pub fn file_path(&self, file_name: &str) -> String {
        format!("/files/{}/{}", self.0, file_name)
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Phase of a render job as reported by the status endpoint.
///
/// Phases only move forward through the declaration order; `Success` and
/// `Failure` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    /// Waiting in the queue
    #[default]
    Pending,
    /// Picked up by a worker, scene being prepared
    Processing,
    /// Frames being rendered
    Rendering,
    /// Audio being muxed into the rendered videos
    #[serde(rename = "COMBINING A/V", alias = "COMBINING_AV")]
    CombiningAv,
    /// Videos are ready for download
    Success,
    /// The job failed
    Failure,
}

impl JobPhase {
    /// Wire value of the `state` field.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Pending => "PENDING",
            JobPhase::Processing => "PROCESSING",
            JobPhase::Rendering => "RENDERING",
            JobPhase::CombiningAv => "COMBINING A/V",
            JobPhase::Success => "SUCCESS",
            JobPhase::Failure => "FAILURE",
        }
    }

    /// Parse a wire `state` value. Both spellings of the combining phase are
    /// accepted.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(JobPhase::Pending),
            "PROCESSING" => Some(JobPhase::Processing),
            "RENDERING" => Some(JobPhase::Rendering),
            "COMBINING A/V" | "COMBINING_AV" => Some(JobPhase::CombiningAv),
            "SUCCESS" => Some(JobPhase::Success),
            "FAILURE" => Some(JobPhase::Failure),
            _ => None,
        }
    }

    /// Position in the lifecycle ordering. Both terminal phases share a rank.
    pub fn rank(&self) -> u8 {
        match self {
            JobPhase::Pending => 0,
            JobPhase::Processing => 1,
            JobPhase::Rendering => 2,
            JobPhase::CombiningAv => 3,
            JobPhase::Success | JobPhase::Failure => 4,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Success | JobPhase::Failure)
    }

    /// Whether a job in this phase may move to `next`.
    ///
    /// Staying in the same non-terminal phase is allowed (progress updates),
    /// skipping forward is allowed, going back or leaving a terminal phase is not.
    /// `Failure` is reachable from every non-terminal phase.
    pub fn can_transition_to(&self, next: JobPhase) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == JobPhase::Failure || next.rank() >= self.rank()
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_paths() {
        let id = JobId::from_string("abc");
        assert_eq!(id.status_path(), "/status/abc");
        assert_eq!(id.file_path("walk01_UB.mp4"), "/files/abc/walk01_UB.mp4");
    }

    #[test]
    fn test_phase_wire_names() {
        assert_eq!(
            serde_json::to_string(&JobPhase::CombiningAv).unwrap(),
            "\"COMBINING A/V\""
        );
        let phase: JobPhase = serde_json::from_str("\"COMBINING_AV\"").unwrap();
        assert_eq!(phase, JobPhase::CombiningAv);
        assert_eq!(JobPhase::from_wire("RENDERING"), Some(JobPhase::Rendering));
        assert_eq!(JobPhase::from_wire("UNKNOWN_PHASE"), None);
    }

    #[test]
    fn test_phase_transitions() {
        assert!(JobPhase::Pending.can_transition_to(JobPhase::Rendering));
        assert!(JobPhase::Rendering.can_transition_to(JobPhase::Rendering));
        assert!(JobPhase::Rendering.can_transition_to(JobPhase::Failure));
        assert!(!JobPhase::Rendering.can_transition_to(JobPhase::Processing));
        assert!(!JobPhase::Success.can_transition_to(JobPhase::Failure));
        assert!(!JobPhase::Failure.can_transition_to(JobPhase::Failure));
    }
}

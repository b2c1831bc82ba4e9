//! Status document exchanged between the status endpoint and polling clients.
//!
//! On the wire a status is `{"state": <phase>, "result": <payload>}` where the
//! payload shape depends on the phase. [`JobStatus`] is the typed view; the
//! conversion from [`StatusDocument`] is the single place where payloads are
//! validated.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::job::JobPhase;

/// Raw status document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    /// Phase name
    pub state: String,
    /// Phase-dependent payload
    #[serde(default)]
    pub result: Value,
}

/// Frame counters reported while rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderProgress {
    /// Frames rendered so far
    pub current: u64,
    /// Frames to render in total
    pub total: u64,
}

impl RenderProgress {
    /// Completion percentage, floored. Computed from the counters as given,
    /// capped at 100.
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 0;
        }
        (self.current.saturating_mul(100) / self.total).min(100)
    }
}

/// Typed job status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending { jobs_in_queue: u64 },
    Processing,
    Rendering(RenderProgress),
    CombiningAv,
    Success { files: Vec<String> },
    Failure { error_detail: String },
}

/// Errors turning a [`StatusDocument`] into a [`JobStatus`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusError {
    #[error("Unknown job phase: {0}")]
    UnknownPhase(String),

    #[error("Malformed {phase} payload: {reason}")]
    MalformedPayload { phase: &'static str, reason: String },
}

impl StatusError {
    fn malformed(phase: JobPhase, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            phase: phase.as_str(),
            reason: reason.into(),
        }
    }
}

#[derive(Deserialize)]
struct PendingPayload {
    jobs_in_queue: u64,
}

#[derive(Deserialize)]
struct SuccessPayload {
    files: Vec<String>,
}

#[derive(Deserialize)]
struct FailurePayload {
    error_detail: String,
}

impl JobStatus {
    pub fn phase(&self) -> JobPhase {
        match self {
            JobStatus::Pending { .. } => JobPhase::Pending,
            JobStatus::Processing => JobPhase::Processing,
            JobStatus::Rendering(_) => JobPhase::Rendering,
            JobStatus::CombiningAv => JobPhase::CombiningAv,
            JobStatus::Success { .. } => JobPhase::Success,
            JobStatus::Failure { .. } => JobPhase::Failure,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Build the wire document for this status.
    pub fn to_document(&self) -> StatusDocument {
        let result = match self {
            JobStatus::Pending { jobs_in_queue } => {
                serde_json::json!({ "jobs_in_queue": jobs_in_queue })
            }
            JobStatus::Processing | JobStatus::CombiningAv => Value::Null,
            JobStatus::Rendering(progress) => {
                serde_json::json!({ "current": progress.current, "total": progress.total })
            }
            JobStatus::Success { files } => serde_json::json!({ "files": files }),
            JobStatus::Failure { error_detail } => {
                serde_json::json!({ "error_detail": error_detail })
            }
        };

        StatusDocument {
            state: self.phase().as_str().to_string(),
            result,
        }
    }

    /// Validate a wire document.
    pub fn from_document(doc: StatusDocument) -> Result<Self, StatusError> {
        let phase = JobPhase::from_wire(&doc.state)
            .ok_or_else(|| StatusError::UnknownPhase(doc.state.clone()))?;

        match phase {
            JobPhase::Pending => {
                let payload: PendingPayload = serde_json::from_value(doc.result)
                    .map_err(|e| StatusError::malformed(phase, e.to_string()))?;
                Ok(JobStatus::Pending {
                    jobs_in_queue: payload.jobs_in_queue,
                })
            }
            JobPhase::Processing => Ok(JobStatus::Processing),
            JobPhase::Rendering => {
                let progress: RenderProgress = serde_json::from_value(doc.result)
                    .map_err(|e| StatusError::malformed(phase, e.to_string()))?;
                if progress.total == 0 {
                    return Err(StatusError::malformed(phase, "total must be positive"));
                }
                Ok(JobStatus::Rendering(progress))
            }
            JobPhase::CombiningAv => Ok(JobStatus::CombiningAv),
            JobPhase::Success => {
                // Older servers send the payload as a JSON-encoded string.
                let value = match doc.result {
                    Value::String(raw) => serde_json::from_str(&raw)
                        .map_err(|e| StatusError::malformed(phase, e.to_string()))?,
                    other => other,
                };
                let payload: SuccessPayload = serde_json::from_value(value)
                    .map_err(|e| StatusError::malformed(phase, e.to_string()))?;
                if payload.files.is_empty() {
                    return Err(StatusError::malformed(phase, "no result files"));
                }
                Ok(JobStatus::Success {
                    files: payload.files,
                })
            }
            JobPhase::Failure => Ok(JobStatus::Failure {
                error_detail: failure_detail(doc.result),
            }),
        }
    }
}

/// Failure details are surfaced verbatim whatever shape the server used.
fn failure_detail(result: Value) -> String {
    match result {
        Value::String(detail) => detail,
        Value::Null => String::new(),
        other => match serde_json::from_value::<FailurePayload>(other.clone()) {
            Ok(payload) => payload.error_detail,
            Err(_) => other.to_string(),
        },
    }
}

impl TryFrom<StatusDocument> for JobStatus {
    type Error = StatusError;

    fn try_from(doc: StatusDocument) -> Result<Self, Self::Error> {
        JobStatus::from_document(doc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(state: &str, result: Value) -> StatusDocument {
        StatusDocument {
            state: state.to_string(),
            result,
        }
    }

    #[test]
    fn test_pending_payload() {
        let status = JobStatus::from_document(doc("PENDING", json!({ "jobs_in_queue": 3 }))).unwrap();
        assert_eq!(status, JobStatus::Pending { jobs_in_queue: 3 });
    }

    #[test]
    fn test_rendering_percent_is_floored() {
        let progress = RenderProgress { current: 2, total: 3 };
        assert_eq!(progress.percent(), 66);
        let progress = RenderProgress { current: 55, total: 100 };
        assert_eq!(progress.percent(), 55);
        let progress = RenderProgress { current: 120, total: 100 };
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_rendering_rejects_zero_total() {
        let err = JobStatus::from_document(doc("RENDERING", json!({ "current": 0, "total": 0 })))
            .unwrap_err();
        assert!(matches!(err, StatusError::MalformedPayload { .. }));
    }

    #[test]
    fn test_success_accepts_object_and_encoded_string() {
        let object = JobStatus::from_document(doc("SUCCESS", json!({ "files": ["/f/a", "/f/b"] })))
            .unwrap();
        let encoded = JobStatus::from_document(doc(
            "SUCCESS",
            json!("{\"files\": [\"/f/a\", \"/f/b\"]}"),
        ))
        .unwrap();
        assert_eq!(object, encoded);
        assert_eq!(
            object,
            JobStatus::Success {
                files: vec!["/f/a".to_string(), "/f/b".to_string()]
            }
        );
    }

    #[test]
    fn test_success_requires_files() {
        let err = JobStatus::from_document(doc("SUCCESS", json!({ "files": [] }))).unwrap_err();
        assert!(matches!(err, StatusError::MalformedPayload { .. }));
    }

    #[test]
    fn test_failure_detail_shapes() {
        let status = JobStatus::from_document(doc(
            "FAILURE",
            json!({ "error_detail": "render crashed" }),
        ))
        .unwrap();
        assert_eq!(
            status,
            JobStatus::Failure {
                error_detail: "render crashed".to_string()
            }
        );

        let status = JobStatus::from_document(doc("FAILURE", json!("render crashed"))).unwrap();
        assert_eq!(
            status,
            JobStatus::Failure {
                error_detail: "render crashed".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_phase() {
        let err = JobStatus::from_document(doc("UNKNOWN_PHASE", Value::Null)).unwrap_err();
        assert_eq!(err, StatusError::UnknownPhase("UNKNOWN_PHASE".to_string()));
    }

    #[test]
    fn test_document_round_trip_for_combining() {
        let document = JobStatus::CombiningAv.to_document();
        assert_eq!(document.state, "COMBINING A/V");
        assert_eq!(JobStatus::from_document(document).unwrap(), JobStatus::CombiningAv);
    }
}

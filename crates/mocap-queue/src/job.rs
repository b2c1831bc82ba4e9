//! Render job records and queue entries.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use mocap_models::{JobId, JobPhase, JobStatus, RenderProgress, RotationMode, StatusDocument};
use serde::{Deserialize, Serialize};

use crate::error::{QueueError, QueueResult};

/// A job waiting for a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Uploaded BVH clip
    pub motion_path: PathBuf,
    /// Uploaded audio track
    pub audio_path: Option<PathBuf>,
    /// Avatar rotation
    pub rotation: RotationMode,
    /// Directory holding this job's uploads, removed once the job ends
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,
    /// When the job was accepted
    pub created_at: DateTime<Utc>,
}

impl RenderJob {
    pub fn new(job_id: JobId, motion_path: impl Into<PathBuf>, rotation: RotationMode) -> Self {
        Self {
            job_id,
            motion_path: motion_path.into(),
            audio_path: None,
            rotation,
            upload_dir: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_audio(mut self, audio_path: impl Into<PathBuf>) -> Self {
        self.audio_path = Some(audio_path.into());
        self
    }

    pub fn with_upload_dir(mut self, upload_dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(upload_dir.into());
        self
    }

    pub fn has_audio(&self) -> bool {
        self.audio_path.is_some()
    }

    /// File stem of the uploaded clip, used to name the output videos.
    pub fn base_name(&self) -> String {
        self.motion_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.job_id.to_string())
    }
}

/// Server-side state of one render job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job: RenderJob,
    pub phase: JobPhase,
    /// Frames rendered so far, across all camera views
    #[serde(default)]
    pub frames_done: u64,
    /// Frames to render in total, 0 until the renderer reports it
    #[serde(default)]
    pub frames_total: u64,
    /// Artifact file names, in camera view order
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub error_detail: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Fresh PENDING record for a just-accepted job.
    pub fn pending(job: RenderJob) -> Self {
        Self {
            job,
            phase: JobPhase::Pending,
            frames_done: 0,
            frames_total: 0,
            files: Vec::new(),
            error_detail: None,
            updated_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &JobId {
        &self.job.job_id
    }

    /// Move to `next`, refusing backward moves and moves out of a terminal
    /// phase. Re-entering the current phase is allowed.
    pub fn transition(&mut self, next: JobPhase) -> QueueResult<()> {
        if !self.phase.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                job_id: self.id().clone(),
                from: self.phase,
                to: next,
            });
        }
        self.phase = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Status as reported to clients.
    ///
    /// A RENDERING record without a known frame total is reported as
    /// PROCESSING so the client never sees a zero total.
    pub fn status(&self, jobs_in_queue: u64) -> JobStatus {
        match self.phase {
            JobPhase::Pending => JobStatus::Pending { jobs_in_queue },
            JobPhase::Processing => JobStatus::Processing,
            JobPhase::Rendering if self.frames_total == 0 => JobStatus::Processing,
            JobPhase::Rendering => JobStatus::Rendering(RenderProgress {
                current: self.frames_done.min(self.frames_total),
                total: self.frames_total,
            }),
            JobPhase::CombiningAv => JobStatus::CombiningAv,
            JobPhase::Success => JobStatus::Success {
                files: self
                    .files
                    .iter()
                    .map(|name| self.job.job_id.file_path(name))
                    .collect(),
            },
            JobPhase::Failure => JobStatus::Failure {
                error_detail: self
                    .error_detail
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            },
        }
    }

    pub fn status_document(&self, jobs_in_queue: u64) -> StatusDocument {
        self.status(jobs_in_queue).to_document()
    }
}

//! Job submission and status handlers.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mocap_models::{JobId, RotationMode, StatusDocument};
use mocap_queue::{JobRecord, RenderJob};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::auth::Authorized;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

const MOTION_FIELD: &str = "bvh_file";
const AUDIO_FIELD: &str = "audio_file";

#[derive(Debug, Deserialize)]
pub struct RenderParams {
    pub p_rotate: Option<String>,
}

/// Files received with a submission.
#[derive(Debug, Default)]
struct Uploads {
    motion: Option<PathBuf>,
    audio: Option<PathBuf>,
}

/// Accept a motion clip (and optional audio track) and queue it for rendering.
///
/// Responds 202 with the job's status path as a plain-text body.
pub async fn submit_render(
    _auth: Authorized,
    State(state): State<AppState>,
    Query(params): Query<RenderParams>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, String)> {
    let rotation = match params.p_rotate.as_deref() {
        None => RotationMode::Default,
        Some(raw) => raw
            .parse::<RotationMode>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
    };

    let job_id = JobId::new();
    let upload_dir = state.config.job_upload_dir(job_id.as_str());
    tokio::fs::create_dir_all(&upload_dir).await?;

    let uploads = match receive_uploads(&mut multipart, &upload_dir).await {
        Ok(uploads) => uploads,
        Err(e) => {
            discard_uploads(&upload_dir).await;
            return Err(e);
        }
    };
    let Some(motion) = uploads.motion else {
        discard_uploads(&upload_dir).await;
        return Err(ApiError::bad_request(format!("Missing {} field", MOTION_FIELD)));
    };

    let mut job = RenderJob::new(job_id.clone(), motion, rotation).with_upload_dir(&upload_dir);
    if let Some(audio) = uploads.audio {
        job = job.with_audio(audio);
    }
    let with_audio = job.has_audio();

    state.store.create(JobRecord::pending(job.clone())).await?;
    let queued = state.queue.enqueue(job).await;

    metrics::record_job_enqueued(rotation.as_str(), with_audio);
    metrics::set_queue_length(queued);
    info!(
        job_id = %job_id,
        rotation = %rotation,
        audio = with_audio,
        jobs_in_queue = queued,
        "Render job queued"
    );

    Ok((StatusCode::ACCEPTED, job_id.status_path()))
}

/// Current status document of a job.
pub async fn get_status(
    _auth: Authorized,
    State(state): State<AppState>,
    UrlPath(job_id): UrlPath<String>,
) -> ApiResult<Json<StatusDocument>> {
    let job_id = JobId::from_string(job_id);
    let record = state
        .store
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Job {}", job_id)))?;

    let jobs_in_queue = state.queue.len().await;
    metrics::set_queue_length(jobs_in_queue);

    Ok(Json(record.status_document(jobs_in_queue as u64)))
}

async fn receive_uploads(multipart: &mut Multipart, dir: &Path) -> ApiResult<Uploads> {
    let mut uploads = Uploads::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(MOTION_FIELD) => {
                let path = save_field(field, dir, "motion.bvh").await?;
                if tokio::fs::metadata(&path).await?.len() == 0 {
                    return Err(ApiError::bad_request(format!("{} is empty", MOTION_FIELD)));
                }
                uploads.motion = Some(path);
            }
            Some(AUDIO_FIELD) => {
                uploads.audio = Some(save_field(field, dir, "audio").await?);
            }
            // Unknown fields are drained and ignored.
            _ => {}
        }
    }

    if let (Some(motion), Some(audio)) = (&uploads.motion, &uploads.audio) {
        if motion == audio {
            return Err(ApiError::bad_request(format!(
                "{} and {} must have different file names",
                MOTION_FIELD, AUDIO_FIELD
            )));
        }
    }

    Ok(uploads)
}

/// Remove the uploads of a rejected submission.
async fn discard_uploads(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        warn!("Could not remove {}: {}", dir.display(), e);
    }
}

/// Stream one multipart field to `dir`, keeping the client's file name.
async fn save_field(mut field: Field<'_>, dir: &Path, fallback: &str) -> ApiResult<PathBuf> {
    let path = dir.join(sanitize_file_name(field.file_name(), fallback));
    let mut file = tokio::fs::File::create(&path).await?;

    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(path)
}

/// Final path component of a client-supplied file name.
fn sanitize_file_name(raw: Option<&str>, fallback: &str) -> String {
    raw.and_then(|name| name.rsplit(['/', '\\']).next())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .unwrap_or(fallback)
        .to_string()
}

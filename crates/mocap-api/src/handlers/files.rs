//! Finished video downloads.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use mocap_models::JobId;
use tokio_util::io::ReaderStream;

use crate::auth::Authorized;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Serve one finished video of a job.
///
/// Only names recorded as the job's results are served, so the path never
/// reaches outside the job's output directory.
pub async fn get_file(
    _auth: Authorized,
    State(state): State<AppState>,
    Path((job_id, file_name)): Path<(String, String)>,
) -> ApiResult<Response> {
    let job_id = JobId::from_string(job_id);
    let record = state
        .store
        .get(&job_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Job {}", job_id)))?;

    if !record.files.iter().any(|f| *f == file_name) {
        return Err(ApiError::not_found(format!(
            "File {} of job {}",
            file_name, job_id
        )));
    }

    let path = state
        .config
        .job_output_dir(job_id.as_str())
        .join(&file_name);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found(format!(
                "File {} of job {}",
                file_name, job_id
            )));
        }
        Err(e) => return Err(e.into()),
    };
    let length = file.metadata().await?.len();

    metrics::record_file_served();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, length)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        )
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

//! Processing of a single render job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use mocap_media::{
    progress_channel, ProgressSender, RenderBackend, RenderEvent, RenderRequest,
};
use mocap_models::{JobId, JobPhase};
use mocap_queue::{JobStore, RenderJob};
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Room for progress events between the renderer and the store writer.
const PROGRESS_CHANNEL_CAPACITY: usize = 64;

/// Takes one job from PROCESSING to SUCCESS or FAILURE.
pub struct JobProcessor {
    config: WorkerConfig,
    store: JobStore,
    backend: Arc<dyn RenderBackend>,
}

impl JobProcessor {
    pub fn new(config: WorkerConfig, store: JobStore, backend: Arc<dyn RenderBackend>) -> Self {
        Self {
            config,
            store,
            backend,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run a job to a terminal phase and return that phase.
    ///
    /// Errors are recorded on the job as its failure detail rather than
    /// returned. The job's scratch and upload directories are removed
    /// afterwards.
    pub async fn run(&self, job: RenderJob) -> JobPhase {
        let logger = JobLogger::new(&job.job_id, self.backend.name());
        let span = logger.create_span();
        let started = Instant::now();

        logger.log_start(&format!(
            "{} (rotation {}, audio: {})",
            job.motion_path.display(),
            job.rotation,
            job.has_audio()
        ));
        metrics::record_job_started(self.backend.name());

        let (sender, events) = progress_channel(PROGRESS_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        let forwarder = tokio::spawn(forward_progress(
            self.store.clone(),
            job.job_id.clone(),
            logger.clone(),
            events,
            stop_rx,
        ));

        let result = match tokio::time::timeout(
            self.config.job_timeout,
            self.process(&job, &logger, sender).instrument(span),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(WorkerError::Timeout(self.config.job_timeout)),
        };

        // The terminal write must be the last write to the record.
        let _ = stop_tx.send(true);
        if let Err(e) = forwarder.await {
            logger.log_warning(&format!("Progress forwarder failed: {}", e));
        }

        let phase = match result {
            Ok(files) => match self.store.complete(&job.job_id, files).await {
                Ok(record) => {
                    logger.log_completion(&format!("{} video(s) ready", record.files.len()));
                    metrics::record_job_completed(
                        self.backend.name(),
                        started.elapsed().as_secs_f64(),
                    );
                    JobPhase::Success
                }
                Err(e) => self.fail(&job.job_id, &logger, WorkerError::from(e)).await,
            },
            Err(e) => self.fail(&job.job_id, &logger, e).await,
        };

        remove_dir(&self.config.job_work_dir(job.job_id.as_str()), &logger).await;
        if let Some(upload_dir) = &job.upload_dir {
            remove_dir(upload_dir, &logger).await;
        }

        phase
    }

    async fn process(
        &self,
        job: &RenderJob,
        logger: &JobLogger,
        progress: ProgressSender,
    ) -> WorkerResult<Vec<String>> {
        self.store
            .set_phase(&job.job_id, JobPhase::Processing)
            .await?;
        logger.log_phase(JobPhase::Processing);

        let request = RenderRequest {
            job_id: job.job_id.clone(),
            motion_path: job.motion_path.clone(),
            audio_path: job.audio_path.clone(),
            rotation: job.rotation,
            work_dir: self.config.job_work_dir(job.job_id.as_str()),
        };

        let videos = self.backend.render(&request, progress).await?;

        self.config.naming.check_count(videos.len())?;
        self.place(job, &videos).await
    }

    /// Move rendered videos to their download names. Returns the file names.
    async fn place(&self, job: &RenderJob, videos: &[PathBuf]) -> WorkerResult<Vec<String>> {
        let out_dir = self.config.job_output_dir(job.job_id.as_str());
        tokio::fs::create_dir_all(&out_dir).await?;

        let base_name = job.base_name();
        let mut names = Vec::with_capacity(videos.len());
        for (index, video) in videos.iter().enumerate() {
            let name = self
                .config
                .naming
                .file_name(&base_name, index)
                .ok_or_else(|| WorkerError::job_failed(format!("No file name for video {}", index)))?;
            mocap_media::move_file(video, &out_dir.join(&name)).await?;
            names.push(name);
        }

        Ok(names)
    }

    async fn fail(&self, job_id: &JobId, logger: &JobLogger, error: WorkerError) -> JobPhase {
        let detail = error.detail();
        logger.log_error(&detail);
        metrics::record_job_failed(self.backend.name(), failure_reason(&error));

        if let Err(e) = self.store.fail(job_id, detail).await {
            logger.log_error(&format!("Could not record failure: {}", e));
        }
        JobPhase::Failure
    }
}

/// Write render events to the store as they arrive.
///
/// Stops when every sender is gone, or on `stop` once the queued events are
/// written. A write in flight always finishes first.
async fn forward_progress(
    store: JobStore,
    job_id: JobId,
    logger: JobLogger,
    mut events: mpsc::Receiver<RenderEvent>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            biased;
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = stop.changed() => break,
        };

        let result = match event {
            RenderEvent::Rendering { current, total } => {
                logger.log_progress(current, total);
                store.set_progress(&job_id, current, total).await
            }
            RenderEvent::CombiningAudio => {
                logger.log_phase(JobPhase::CombiningAv);
                store.set_phase(&job_id, JobPhase::CombiningAv).await
            }
        };

        if let Err(e) = result {
            logger.log_warning(&format!("Progress not recorded: {}", e));
        }
    }
}

async fn remove_dir(dir: &Path, logger: &JobLogger) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            logger.log_warning(&format!("Could not remove {}: {}", dir.display(), e));
        }
    }
}

fn failure_reason(error: &WorkerError) -> &'static str {
    match error {
        WorkerError::Timeout(_) => "timeout",
        WorkerError::Media(_) => "render",
        WorkerError::Queue(_) => "store",
        WorkerError::ArtifactCount(_) => "artifacts",
        WorkerError::Io(_) => "io",
        WorkerError::JobFailed(_) => "job",
    }
}

//! Test doubles shared by the worker tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mocap_media::{MediaError, MediaResult, ProgressSender, RenderBackend, RenderEvent, RenderRequest};
use mocap_models::{JobId, RotationMode};
use mocap_queue::{JobRecord, JobStore, RenderJob};

/// Backend that writes `view-N` text files instead of rendering.
#[derive(Default)]
pub struct FakeBackend {
    videos: usize,
    events: Vec<RenderEvent>,
    failure: Option<String>,
    delay: Duration,
    running: Arc<AtomicUsize>,
    max_running: Arc<AtomicUsize>,
    kept_sender: Option<Arc<Mutex<Option<ProgressSender>>>>,
}

impl FakeBackend {
    pub fn new(videos: usize) -> Self {
        Self {
            videos,
            ..Default::default()
        }
    }

    pub fn with_events(mut self, events: Vec<RenderEvent>) -> Self {
        self.events = events;
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Keep a copy of the progress sender, like a renderer task that
    /// outlives its job. The copy is stored in the returned slot.
    pub fn keeping_sender(mut self) -> (Self, Arc<Mutex<Option<ProgressSender>>>) {
        let slot = Arc::new(Mutex::new(None));
        self.kept_sender = Some(Arc::clone(&slot));
        (self, slot)
    }

    /// Highest number of renders observed running at once.
    pub fn max_running(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.max_running)
    }
}

#[async_trait]
impl RenderBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn view_count(&self) -> usize {
        self.videos
    }

    async fn render(
        &self,
        request: &RenderRequest,
        progress: ProgressSender,
    ) -> MediaResult<Vec<PathBuf>> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        if let Some(slot) = &self.kept_sender {
            *slot.lock().unwrap() = Some(progress.clone());
        }

        for event in &self.events {
            match *event {
                RenderEvent::Rendering { current, total } => progress.rendering(current, total),
                RenderEvent::CombiningAudio => progress.combining_audio().await,
            }
        }
        tokio::time::sleep(self.delay).await;
        self.running.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = &self.failure {
            return Err(MediaError::blender_failed(message.clone(), None, Some(1)));
        }

        tokio::fs::create_dir_all(&request.work_dir).await?;
        let mut videos = Vec::with_capacity(self.videos);
        for index in 0..self.videos {
            let path = request.work_dir.join(format!("{}.mp4", index));
            tokio::fs::write(&path, format!("view-{}", index)).await?;
            videos.push(path);
        }
        Ok(videos)
    }
}

/// Create a PENDING record for a job and return the job.
pub async fn pending_job(store: &JobStore, id: &str, motion_file: &str) -> RenderJob {
    let job = RenderJob::new(
        JobId::from_string(id),
        PathBuf::from("/uploads").join(id).join(motion_file),
        RotationMode::Default,
    );
    store.create(JobRecord::pending(job.clone())).await.unwrap();
    job
}

/// Like [`pending_job`], with the clip written into a real upload directory
/// under `root`.
pub async fn pending_job_with_uploads(store: &JobStore, id: &str, root: &Path) -> RenderJob {
    let upload_dir = root.join("uploads").join(id);
    std::fs::create_dir_all(&upload_dir).unwrap();
    let motion_path = upload_dir.join("walk01.bvh");
    std::fs::write(&motion_path, "HIERARCHY").unwrap();

    let job = RenderJob::new(JobId::from_string(id), motion_path, RotationMode::Default)
        .with_upload_dir(&upload_dir);
    store.create(JobRecord::pending(job.clone())).await.unwrap();
    job
}

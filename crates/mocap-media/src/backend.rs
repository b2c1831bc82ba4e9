//! The render backend seam.
//!
//! The worker hands a `RenderRequest` to a `RenderBackend` and follows the
//! job through `RenderEvent`s sent on a progress channel.

use std::path::PathBuf;

use async_trait::async_trait;
use mocap_models::{JobId, RotationMode};
use tokio::sync::mpsc;

use crate::error::MediaResult;

/// Everything a backend needs to render one job.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub job_id: JobId,
    /// BVH clip to render
    pub motion_path: PathBuf,
    /// Audio track to mux into every video
    pub audio_path: Option<PathBuf>,
    pub rotation: RotationMode,
    /// Scratch directory owned by this job
    pub work_dir: PathBuf,
}

/// Progress of a render as seen by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    /// Frames written so far out of the total across every view
    Rendering { current: u64, total: u64 },
    /// All views rendered, audio is being muxed in
    CombiningAudio,
}

/// Progress sender for render backends.
///
/// Uses a bounded channel; events are dropped when the channel is full since
/// a later event supersedes them.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    tx: mpsc::Sender<RenderEvent>,
}

impl ProgressSender {
    pub fn new(tx: mpsc::Sender<RenderEvent>) -> Self {
        Self { tx }
    }

    pub fn rendering(&self, current: u64, total: u64) {
        let _ = self.tx.try_send(RenderEvent::Rendering { current, total });
    }

    /// Phase changes are never dropped.
    pub async fn combining_audio(&self) {
        let _ = self.tx.send(RenderEvent::CombiningAudio).await;
    }

    /// True once nobody is listening for events any more.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a progress channel.
pub fn progress_channel(capacity: usize) -> (ProgressSender, mpsc::Receiver<RenderEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (ProgressSender::new(tx), rx)
}

/// Turns a motion clip into one video per camera view.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Number of videos every successful render returns.
    fn view_count(&self) -> usize;

    /// Render `request`. Returns one video per view, in view order.
    async fn render(
        &self,
        request: &RenderRequest,
        progress: ProgressSender,
    ) -> MediaResult<Vec<PathBuf>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_progress_channel_delivers_in_order() {
        let (sender, mut rx) = progress_channel(8);
        sender.rendering(1, 10);
        sender.rendering(5, 10);
        sender.combining_audio().await;
        drop(sender);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                RenderEvent::Rendering { current: 1, total: 10 },
                RenderEvent::Rendering { current: 5, total: 10 },
                RenderEvent::CombiningAudio,
            ]
        );
    }

    #[tokio::test]
    async fn test_full_channel_drops_progress() {
        let (sender, mut rx) = progress_channel(1);
        sender.rendering(1, 10);
        sender.rendering(2, 10);
        drop(sender);

        assert_eq!(
            rx.recv().await,
            Some(RenderEvent::Rendering { current: 1, total: 10 })
        );
        assert_eq!(rx.recv().await, None);
    }
}

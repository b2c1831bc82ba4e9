//! Blender render backend.
//!
//! Renders the clip once per camera view with the render script, then muxes
//! the audio track into every video when the job has one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::backend::{ProgressSender, RenderBackend, RenderRequest};
use crate::command::{BlenderCommand, BlenderRunner};
use crate::error::{MediaError, MediaResult};
use crate::mux::AudioMuxer;
use crate::progress::RenderLine;

/// Blender backend configuration.
#[derive(Debug, Clone)]
pub struct BlenderConfig {
    /// Blender executable
    pub blender_bin: PathBuf,
    /// Render script run inside Blender
    pub script_path: PathBuf,
    /// Camera views, one video each, in result order
    pub views: Vec<String>,
    /// First frame to render
    pub start_frame: u32,
    /// Frames to render after the start frame; 0 renders the whole clip
    pub duration: u32,
    pub resolution_x: u32,
    pub resolution_y: u32,
    /// FFmpeg executable used for audio muxing
    pub ffmpeg_bin: PathBuf,
    /// Limit for a single Blender or FFmpeg run
    pub tool_timeout: Duration,
}

impl Default for BlenderConfig {
    fn default() -> Self {
        Self {
            blender_bin: PathBuf::from("blender"),
            script_path: PathBuf::from("scripts/blender_render.py"),
            views: vec!["UB".to_string(), "FB".to_string()],
            start_frame: 0,
            duration: 0,
            resolution_x: 1280,
            resolution_y: 720,
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            tool_timeout: Duration::from_secs(1800),
        }
    }
}

impl BlenderConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            blender_bin: std::env::var("BLENDER_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.blender_bin),
            script_path: std::env::var("BLENDER_SCRIPT")
                .map(PathBuf::from)
                .unwrap_or(defaults.script_path),
            views: std::env::var("RENDER_VIEWS")
                .ok()
                .map(|v| parse_views(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.views),
            start_frame: env_parse("RENDER_START_FRAME").unwrap_or(defaults.start_frame),
            duration: env_parse("RENDER_DURATION_FRAMES").unwrap_or(defaults.duration),
            resolution_x: env_parse("RENDER_RESOLUTION_X").unwrap_or(defaults.resolution_x),
            resolution_y: env_parse("RENDER_RESOLUTION_Y").unwrap_or(defaults.resolution_y),
            ffmpeg_bin: std::env::var("FFMPEG_BIN")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_bin),
            tool_timeout: env_parse("RENDER_TOOL_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.tool_timeout),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn parse_views(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Renders through a local Blender installation.
#[derive(Debug, Clone)]
pub struct BlenderRenderer {
    config: BlenderConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl BlenderRenderer {
    pub fn new(config: BlenderConfig) -> Self {
        Self {
            config,
            cancel_rx: None,
        }
    }

    /// Kill running tools once `cancel_rx` turns true.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn config(&self) -> &BlenderConfig {
        &self.config
    }

    fn runner(&self) -> BlenderRunner {
        let runner = BlenderRunner::new().with_timeout(self.config.tool_timeout);
        match &self.cancel_rx {
            Some(rx) => runner.with_cancel(rx.clone()),
            None => runner,
        }
    }

    fn muxer(&self) -> AudioMuxer {
        let muxer = AudioMuxer::new(&self.config.ffmpeg_bin).with_timeout(self.config.tool_timeout);
        match &self.cancel_rx {
            Some(rx) => muxer.with_cancel(rx.clone()),
            None => muxer,
        }
    }

    /// A single configured view renders with the script's default camera, so
    /// single-camera scripts without `--camera` still work.
    fn command(&self, request: &RenderRequest, view: &str) -> BlenderCommand {
        let cmd = BlenderCommand::new(
            &self.config.blender_bin,
            &self.config.script_path,
            &request.motion_path,
        )
        .rotation(request.rotation)
        .start_frame(self.config.start_frame)
        .duration(self.config.duration)
        .env("RENDER_RESOLUTION_X", self.config.resolution_x.to_string())
        .env("RENDER_RESOLUTION_Y", self.config.resolution_y.to_string());

        if self.config.views.len() > 1 {
            cmd.camera(view)
        } else {
            cmd
        }
    }
}

#[async_trait]
impl RenderBackend for BlenderRenderer {
    fn name(&self) -> &'static str {
        "blender"
    }

    fn view_count(&self) -> usize {
        self.config.views.len()
    }

    async fn render(
        &self,
        request: &RenderRequest,
        progress: ProgressSender,
    ) -> MediaResult<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&request.work_dir).await?;

        let runner = self.runner();
        let view_count = self.config.views.len() as u64;
        let mut videos = Vec::with_capacity(self.config.views.len());

        for (index, view) in self.config.views.iter().enumerate() {
            info!(job_id = %request.job_id, view = %view, "Rendering view {}/{}", index + 1, view_count);

            let sender = progress.clone();
            let offset_views = index as u64;
            let cmd = self.command(request, view);
            let rendered = runner
                .run(&cmd, move |line, parser| {
                    let Some(count) = parser.frame_count() else {
                        return;
                    };
                    let done = match line {
                        RenderLine::FrameRange { .. } => 0,
                        RenderLine::Frame { done, .. } => *done,
                        RenderLine::Output(_) => return,
                    };
                    sender.rendering(offset_views * count + done, view_count * count);
                })
                .await?;

            let video = request.work_dir.join(format!("{}.mp4", view));
            move_file(&rendered, &video).await?;
            debug!("View {} written to {}", view, video.display());
            videos.push(video);
        }

        if let Some(audio) = &request.audio_path {
            progress.combining_audio().await;
            let muxer = self.muxer();
            for video in videos.iter_mut() {
                let muxed = with_suffix(video, "_av");
                muxer.mux(video, audio, &muxed).await?;
                let _ = tokio::fs::remove_file(&*video).await;
                *video = muxed;
            }
        }

        Ok(videos)
    }
}

/// `dir/name.ext` -> `dir/name{suffix}.ext`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, suffix, ext.to_string_lossy()),
        None => format!("{}{}", stem, suffix),
    };
    path.with_file_name(file_name)
}

/// Move a file, copying when source and target are on different filesystems.
pub async fn move_file(from: &Path, to: &Path) -> MediaResult<()> {
    if !tokio::fs::try_exists(from).await.unwrap_or(false) {
        return Err(MediaError::FileNotFound(from.to_path_buf()));
    }
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to).await?;
    let _ = tokio::fs::remove_file(from).await;
    Ok(())
}

//! FFmpeg muxing of an audio track into a rendered video.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

use crate::command::{check_ffmpeg, collect_tail, wait_for_exit};
use crate::error::{MediaError, MediaResult};

/// Copies the video stream and encodes the audio to AAC, stopping at the
/// shorter of the two.
#[derive(Debug, Clone)]
pub struct AudioMuxer {
    binary: PathBuf,
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
}

impl Default for AudioMuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl AudioMuxer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            cancel_rx: None,
            timeout: None,
        }
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
            "-map".to_string(),
            "1:a:0".to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-shortest".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }

    /// Write `output`: `video` with `audio` as its sound track.
    pub async fn mux(&self, video: &Path, audio: &Path, output: &Path) -> MediaResult<()> {
        for input in [video, audio] {
            if !tokio::fs::try_exists(input).await.unwrap_or(false) {
                return Err(MediaError::FileNotFound(input.to_path_buf()));
            }
        }

        let binary = check_ffmpeg(&self.binary)?;
        let args = Self::build_args(video, audio, output);
        debug!("Running FFmpeg: {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_handle = collect_tail(child.stderr.take());
        let exit = wait_for_exit(&mut child, self.timeout, self.cancel_rx.clone(), "FFmpeg").await;
        let stderr = stderr_handle.await.unwrap_or_default();

        match exit? {
            Some(0) => Ok(()),
            code => Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(stderr),
                code,
            )),
        }
    }
}

//! Blender command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use mocap_models::RotationMode;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{RenderLine, RenderOutputParser};

/// Lines of stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Builder for one headless Blender run of the render script.
#[derive(Debug, Clone)]
pub struct BlenderCommand {
    binary: PathBuf,
    script: PathBuf,
    input: PathBuf,
    rotation: RotationMode,
    camera: Option<String>,
    start_frame: u32,
    duration: Option<u32>,
    envs: Vec<(String, String)>,
}

impl BlenderCommand {
    pub fn new(
        binary: impl AsRef<Path>,
        script: impl AsRef<Path>,
        input: impl AsRef<Path>,
    ) -> Self {
        Self {
            binary: binary.as_ref().to_path_buf(),
            script: script.as_ref().to_path_buf(),
            input: input.as_ref().to_path_buf(),
            rotation: RotationMode::Default,
            camera: None,
            start_frame: 0,
            duration: None,
            envs: Vec::new(),
        }
    }

    pub fn rotation(mut self, rotation: RotationMode) -> Self {
        self.rotation = rotation;
        self
    }

    /// Camera view to render from.
    pub fn camera(mut self, view: impl Into<String>) -> Self {
        self.camera = Some(view.into());
        self
    }

    /// First frame to render.
    pub fn start_frame(mut self, frame: u32) -> Self {
        self.start_frame = frame;
        self
    }

    /// Number of frames after the start frame to render; 0 renders to the clip's end.
    pub fn duration(mut self, frames: u32) -> Self {
        self.duration = Some(frames).filter(|f| *f > 0);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Parser matching this command's render window.
    pub fn output_parser(&self) -> RenderOutputParser {
        RenderOutputParser::new(self.start_frame, self.duration)
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            "-b".to_string(),
            "--python".to_string(),
            self.script.to_string_lossy().to_string(),
            "--".to_string(),
            "--input".to_string(),
            self.input.to_string_lossy().to_string(),
            "--rotate".to_string(),
            self.rotation.as_str().to_string(),
            "--video".to_string(),
        ];

        if let Some(camera) = &self.camera {
            args.push("--camera".to_string());
            args.push(camera.clone());
        }

        if self.start_frame > 0 {
            args.push("--start".to_string());
            args.push(self.start_frame.to_string());
        }

        if let Some(duration) = self.duration {
            args.push("--duration".to_string());
            args.push(duration.to_string());
        }

        args
    }
}

/// Runner for Blender commands with progress tracking and cancellation.
#[derive(Debug, Clone, Default)]
pub struct BlenderRunner {
    cancel_rx: Option<watch::Receiver<bool>>,
    timeout: Option<Duration>,
}

impl BlenderRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the process once `cancel_rx` turns true.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run a Blender command, passing every informative stdout line to
    /// `on_line`. Returns the path of the rendered video.
    pub async fn run<F>(&self, cmd: &BlenderCommand, mut on_line: F) -> MediaResult<PathBuf>
    where
        F: FnMut(&RenderLine, &RenderOutputParser) + Send + 'static,
    {
        let binary = check_blender(cmd.binary())?;
        let args = cmd.build_args();
        debug!("Running Blender: {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .envs(cmd.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("Blender stdout not captured"))?;
        let stderr_handle = collect_tail(child.stderr.take());

        let mut parser = cmd.output_parser();
        let stdout_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = reader.next_line().await {
                if let Some(event) = parser.parse_line(&line) {
                    on_line(&event, &parser);
                }
            }
            parser
        });

        let exit = wait_for_exit(&mut child, self.timeout, self.cancel_rx.clone(), "Blender").await;
        let parser = stdout_handle
            .await
            .map_err(|e| MediaError::internal(format!("Blender output reader failed: {}", e)))?;
        let stderr = stderr_handle.await.unwrap_or_default();

        match exit? {
            Some(code) if code != 0 => Err(MediaError::blender_failed(
                format!("Blender exited with status {}", code),
                Some(stderr),
                Some(code),
            )),
            None => Err(MediaError::blender_failed(
                "Blender was terminated by a signal",
                Some(stderr),
                None,
            )),
            Some(_) => parser
                .output_file()
                .map(Path::to_path_buf)
                .ok_or_else(|| {
                    MediaError::MissingOutput(cmd.camera.clone().unwrap_or_default())
                }),
        }
    }
}

/// Wait for a child process, honouring a timeout and a cancellation signal.
/// Returns the exit code (`None` when killed by a signal).
pub(crate) async fn wait_for_exit(
    child: &mut Child,
    timeout: Option<Duration>,
    cancel_rx: Option<watch::Receiver<bool>>,
    tool: &str,
) -> MediaResult<Option<i32>> {
    let cancelled = async {
        match cancel_rx {
            Some(mut rx) => {
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
            }
            None => std::future::pending::<()>().await,
        }
    };

    let timed_out = async {
        match timeout {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        status = child.wait() => Ok(status?.code()),
        _ = cancelled => {
            info!("{} cancelled, killing process", tool);
            let _ = child.kill().await;
            Err(MediaError::Cancelled)
        }
        _ = timed_out => {
            let secs = timeout.map(|t| t.as_secs()).unwrap_or_default();
            warn!("{} timed out after {} seconds, killing process", tool, secs);
            let _ = child.kill().await;
            Err(MediaError::Timeout(secs))
        }
    }
}

/// Keep the last lines of a stream for error reports.
pub(crate) fn collect_tail<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(stream) = stream else {
            return String::new();
        };
        let mut lines = BufReader::new(stream).lines();
        let mut tail = std::collections::VecDeque::with_capacity(STDERR_TAIL_LINES);
        while let Ok(Some(line)) = lines.next_line().await {
            if tail.len() == STDERR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect::<Vec<_>>().join("\n")
    })
}

/// Resolve the Blender executable.
pub fn check_blender(binary: &Path) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::BlenderNotFound(binary.display().to_string()))
}

/// Resolve the FFmpeg executable.
pub fn check_ffmpeg(binary: &Path) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::FfmpegNotFound(binary.display().to_string()))
}

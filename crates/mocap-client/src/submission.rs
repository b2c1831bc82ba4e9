//! Render job submission.

use std::path::{Path, PathBuf};

use mocap_models::RotationMode;
use reqwest::multipart::{Form, Part};

use crate::error::{ClientError, ClientResult};

/// Multipart field carrying the motion clip.
pub const MOTION_FIELD: &str = "bvh_file";
/// Multipart field carrying the optional audio track.
pub const AUDIO_FIELD: &str = "audio_file";
/// Query parameter carrying the rotation mode.
pub const ROTATION_PARAM: &str = "p_rotate";

/// A render request as the operator described it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSubmission {
    /// BVH motion clip
    pub motion_file: PathBuf,
    /// Audio track muxed into the videos
    pub audio_file: Option<PathBuf>,
    /// Avatar rotation
    pub rotation: RotationMode,
}

impl JobSubmission {
    pub fn new(motion_file: impl Into<PathBuf>) -> Self {
        Self {
            motion_file: motion_file.into(),
            audio_file: None,
            rotation: RotationMode::default(),
        }
    }

    pub fn with_audio(mut self, audio_file: impl Into<PathBuf>) -> Self {
        self.audio_file = Some(audio_file.into());
        self
    }

    pub fn with_rotation(mut self, rotation: RotationMode) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set the rotation from its wire value, rejecting anything outside the
    /// four known modes.
    pub fn with_rotation_str(self, rotation: &str) -> ClientResult<Self> {
        Ok(self.with_rotation(rotation.parse()?))
    }

    /// Stem of the motion file, used to name downloaded videos.
    pub fn base_name(&self) -> ClientResult<String> {
        self.motion_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ClientError::input(format!(
                    "Motion file has no base name: {}",
                    self.motion_file.display()
                ))
            })
    }

    /// Build the multipart body. Files are read fully here and released
    /// before the request goes out.
    pub(crate) async fn to_form(&self) -> ClientResult<Form> {
        let mut form = Form::new().part(MOTION_FIELD, file_part(&self.motion_file).await?);

        if let Some(audio) = &self.audio_file {
            form = form.part(AUDIO_FIELD, file_part(audio).await?);
        }

        Ok(form)
    }

    /// Fail fast on missing or unreadable inputs, before any network use.
    pub(crate) async fn check_inputs(&self) -> ClientResult<()> {
        self.base_name()?;
        check_readable(&self.motion_file).await?;
        if let Some(audio) = &self.audio_file {
            check_readable(audio).await?;
        }
        Ok(())
    }
}

async fn check_readable(path: &Path) -> ClientResult<()> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| ClientError::input(format!("Cannot read {}: {}", path.display(), e)))?;
    if !metadata.is_file() {
        return Err(ClientError::input(format!("Not a file: {}", path.display())));
    }
    Ok(())
}

async fn file_part(path: &Path) -> ClientResult<Part> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| ClientError::input(format!("Cannot read {}: {}", path.display(), e)))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());

    Ok(Part::bytes(bytes).file_name(file_name))
}

//! Naming of downloaded result videos.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Positional naming convention for result artifacts.
///
/// The artifact at index `i` is stored as `{base}{suffixes[i]}.{extension}`.
/// The default is the two-camera layout: upper body first, full body second.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNaming {
    /// Suffix per artifact position
    pub suffixes: Vec<String>,
    /// File extension, without the dot
    pub extension: String,
}

impl Default for ArtifactNaming {
    fn default() -> Self {
        Self::two_camera()
    }
}

impl ArtifactNaming {
    /// Upper-body (`_UB`) and full-body (`_FB`) views.
    pub fn two_camera() -> Self {
        Self {
            suffixes: vec!["_UB".to_string(), "_FB".to_string()],
            extension: "mp4".to_string(),
        }
    }

    /// Number of artifacts this convention names.
    pub fn expected_count(&self) -> usize {
        self.suffixes.len()
    }

    /// File name for the artifact at `index`, if the convention covers it.
    pub fn file_name(&self, base_name: &str, index: usize) -> Option<String> {
        self.suffixes
            .get(index)
            .map(|suffix| format!("{}{}.{}", base_name, suffix, self.extension))
    }

    /// Check that a job produced exactly as many artifacts as this convention names.
    pub fn check_count(&self, actual: usize) -> Result<(), ArtifactCountMismatch> {
        if actual == self.expected_count() {
            Ok(())
        } else {
            Err(ArtifactCountMismatch {
                expected: self.expected_count(),
                actual,
            })
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Expected {expected} result artifacts, got {actual}")]
pub struct ArtifactCountMismatch {
    pub expected: usize,
    pub actual: usize,
}

//! Character rotation applied when the motion clip is bound to the rig.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How the avatar is turned inside the video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationMode {
    /// No rotation
    #[default]
    Default,
    /// 90 degrees clockwise
    Cw,
    /// 90 degrees counter-clockwise
    Ccw,
    /// 180 degrees
    Flip,
}

impl RotationMode {
    /// All accepted rotation modes.
    pub const ALL: &'static [RotationMode] = &[
        RotationMode::Default,
        RotationMode::Cw,
        RotationMode::Ccw,
        RotationMode::Flip,
    ];

    /// Wire value, as sent in the `p_rotate` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            RotationMode::Default => "default",
            RotationMode::Cw => "cw",
            RotationMode::Ccw => "ccw",
            RotationMode::Flip => "flip",
        }
    }
}

impl fmt::Display for RotationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RotationMode {
    type Err = RotationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(RotationMode::Default),
            "cw" => Ok(RotationMode::Cw),
            "ccw" => Ok(RotationMode::Ccw),
            "flip" => Ok(RotationMode::Flip),
            _ => Err(RotationParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown rotation mode: {0} (expected one of default, cw, ccw, flip)")]
pub struct RotationParseError(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_modes_parse_to_themselves() {
        for mode in RotationMode::ALL {
            assert_eq!(mode.as_str().parse::<RotationMode>().unwrap(), *mode);
        }
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!("left".parse::<RotationMode>().is_err());
        assert!("".parse::<RotationMode>().is_err());
        assert!("CW".parse::<RotationMode>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&RotationMode::Ccw).unwrap();
        assert_eq!(json, "\"ccw\"");
        let mode: RotationMode = serde_json::from_str("\"flip\"").unwrap();
        assert_eq!(mode, RotationMode::Flip);
    }
}

// src/types.rs

use std::str::FromStr;

use serde::Deserialize;

/// How the frames of a dispatch are chosen, as written in config files.
///
/// - `Current`: only the frame of the dispatch context (default).
/// - `Full`: every integer frame of the context's `frameRange:start` ..
///   `frameRange:end`.
/// - `Custom`: an explicit frame list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramesModeKind {
    #[default]
    Current,
    Full,
    Custom,
}

impl FromStr for FramesModeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "current" => Ok(FramesModeKind::Current),
            "full" => Ok(FramesModeKind::Full),
            "custom" => Ok(FramesModeKind::Custom),
            other => Err(format!(
                "invalid frames_mode: {other} (expected \"current\", \"full\" or \"custom\")"
            )),
        }
    }
}

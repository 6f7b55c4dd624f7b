// src/dispatch/frames.rs

//! Resolution of the frames a dispatch covers.

use crate::context::{Context, DEFAULT_FRAME};
use crate::errors::{DispatchError, Result};
use crate::types::FramesModeKind;

/// Context entry holding the first frame of the full range.
pub const FRAME_RANGE_START: &str = "frameRange:start";
/// Context entry holding the last frame of the full range.
pub const FRAME_RANGE_END: &str = "frameRange:end";

const DEFAULT_RANGE_START: i64 = 1;
const DEFAULT_RANGE_END: i64 = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum FramesMode {
    /// The frame of the dispatch context.
    CurrentFrame,
    /// Every integer frame between `frameRange:start` and `frameRange:end`
    /// (inclusive) of the dispatch context, defaulting to 1-100.
    FullRange,
    /// An explicit, already parsed frame list. Order is preserved.
    CustomRange(Vec<f32>),
}

impl FramesMode {
    /// Build a mode from its config-file form.
    pub fn from_kind(kind: FramesModeKind, frames: &[f32]) -> Self {
        match kind {
            FramesModeKind::Current => FramesMode::CurrentFrame,
            FramesModeKind::Full => FramesMode::FullRange,
            FramesModeKind::Custom => FramesMode::CustomRange(frames.to_vec()),
        }
    }

    pub fn resolve(&self, context: &Context) -> Result<Vec<f32>> {
        match self {
            FramesMode::CurrentFrame => Ok(vec![context.frame().unwrap_or(DEFAULT_FRAME)]),
            FramesMode::FullRange => {
                let start = context.get_int(FRAME_RANGE_START, DEFAULT_RANGE_START);
                let end = context.get_int(FRAME_RANGE_END, DEFAULT_RANGE_END);
                if end < start {
                    return Err(DispatchError::Validation(format!(
                        "frame range end ({end}) is before its start ({start})"
                    )));
                }
                Ok((start..=end).map(|f| f as f32).collect())
            }
            FramesMode::CustomRange(frames) => {
                if frames.is_empty() {
                    return Err(DispatchError::Validation(
                        "custom frame range is empty".to_string(),
                    ));
                }
                Ok(frames.clone())
            }
        }
    }
}

//! Wobbly error types.

use std::path::PathBuf;

use crate::clip::ClipError;
use crate::timecodes::TimecodeError;

/// Errors that can occur while reading, replaying or writing Wobbly projects.
#[derive(Debug, thiserror::Error)]
pub enum WobblyError {
    /// Project file or input video does not exist.
    #[error("File not found: '{0}'")]
    FileNotFound(PathBuf),

    /// Failed to read a file.
    #[error("Failed to read file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("Failed to write file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Project file is not valid JSON or has the wrong shape.
    #[error("Invalid project JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Required key absent from the project.
    #[error("Missing required value '{0}'")]
    MissingValue(String),

    /// Key present but unusable.
    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Match string contains characters outside `pcnbu`.
    #[error("Illegal characters found in matches: {}", chars.join(", "))]
    InvalidMatch { chars: Vec<String> },

    /// Decimation cycle other than 5.
    #[error("Only a decimation cycle of 5 frames is supported, got {0}")]
    InvalidCycle(i64),

    /// VFM order that does not describe an interlaced source.
    #[error("Unsupported field order from VFM order {0}: the source may not be progressive")]
    UnsupportedFieldOrder(i64),

    /// Argument of the wrong kind, e.g. orphan handling.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    /// Frame index outside the project's frame range.
    #[error("Frame {frame} is out of range in {context} (project has {num_frames} frames)")]
    FrameIndex {
        frame: usize,
        num_frames: usize,
        context: String,
    },

    /// Range whose start lies after its end.
    #[error("Invalid frame range {start}..={end}")]
    InvalidRange { start: usize, end: usize },

    /// Project output requested before any metrics were gathered.
    #[error("No metrics available; gather metrics before writing a project")]
    NoMetrics,

    /// Clip operation failed.
    #[error("Clip error: {0}")]
    Clip(#[from] ClipError),

    /// Timecode derivation failed.
    #[error("Timecode error: {0}")]
    Timecode(#[from] TimecodeError),
}

impl WobblyError {
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingValue(key.into())
    }

    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    pub fn frame_index(frame: usize, num_frames: usize, context: impl Into<String>) -> Self {
        Self::FrameIndex {
            frame,
            num_frames,
            context: context.into(),
        }
    }
}

/// Result type for Wobbly operations.
pub type WobblyResult<T> = Result<T, WobblyError>;

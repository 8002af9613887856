//! Timecode error types.

use std::path::PathBuf;

/// Errors that can occur while reading or writing timecode files.
#[derive(Debug, thiserror::Error)]
pub enum TimecodeError {
    #[error("Failed to read timecodes '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write timecodes '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Header names neither v1 nor v2.
    #[error("Unsupported timecode format: '{0}'")]
    UnsupportedFormat(String),

    /// A body line could not be parsed.
    #[error("Invalid timecode line {line}: '{content}' ({message})")]
    InvalidLine {
        line: usize,
        content: String,
        message: String,
    },

    /// A v1 file left a frame without a rate and has no `Assume` line.
    #[error("No frame rate for frame {0}")]
    MissingRate(usize),

    /// Decoded sequence does not match the clip.
    #[error("Timecode length mismatch: {timecodes} timecodes for a clip of {clip} frames")]
    LengthMismatch { timecodes: usize, clip: usize },

    #[error("No timecodes")]
    Empty,

    #[error("Invalid rate denominator: {0}")]
    InvalidDenominator(i64),

    /// A stored rate cannot be turned into a frame duration.
    #[error("Frame {frame} has a non-positive rate {rate}")]
    InvalidRate { frame: usize, rate: String },

    #[error(transparent)]
    Clip(#[from] crate::clip::ClipError),
}

impl TimecodeError {
    pub fn invalid_line(line: usize, content: &str, message: impl Into<String>) -> Self {
        Self::InvalidLine {
            line,
            content: content.to_string(),
            message: message.into(),
        }
    }
}

pub type TimecodeResult<T> = Result<T, TimecodeError>;

//! Clip error types.

/// Errors raised by clip operations and host interaction.
#[derive(Debug, thiserror::Error)]
pub enum ClipError {
    /// Frame index past the end of the clip.
    #[error("Frame {frame} out of range (clip has {num_frames} frames)")]
    FrameOutOfRange { frame: usize, num_frames: usize },

    /// Two clips or a clip and a per-frame table disagree on length.
    #[error("Length mismatch: expected {expected} frames, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Range with start after end.
    #[error("Invalid frame range {start}..={end}")]
    InvalidRange { start: usize, end: usize },

    /// Frames with different plane layouts were combined.
    #[error("Frame geometry mismatch: {0}")]
    GeometryMismatch(String),

    /// Plugins needed by a script are not loaded in the host.
    #[error("Missing required plugins: {}", plugins.join(", "))]
    DependencyMissing { plugins: Vec<String> },

    /// Parameter outside its accepted domain.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Failure reported by the host engine.
    #[error("Host error: {0}")]
    Host(String),
}

impl ClipError {
    pub fn out_of_range(frame: usize, num_frames: usize) -> Self {
        Self::FrameOutOfRange { frame, num_frames }
    }

    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::Host(message.into())
    }
}

/// Result type for clip operations.
pub type ClipResult<T> = Result<T, ClipError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_missing_lists_every_plugin() {
        let err = ClipError::DependencyMissing {
            plugins: vec!["vivtc".into(), "fh".into()],
        };
        assert_eq!(err.to_string(), "Missing required plugins: vivtc, fh");
    }
}

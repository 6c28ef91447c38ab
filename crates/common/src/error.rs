//! Error types shared across Highlights crates.

use std::path::PathBuf;

/// Top-level error type for Highlights operations.
#[derive(Debug, thiserror::Error)]
pub enum HighlightsError {
    #[error("Invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Invalid reference: {message}")]
    InvalidReference { message: String },

    #[error("Dangling reference: {message}")]
    DanglingReference { message: String },

    #[error("Invalid {segment} segment: {message}")]
    InvalidSegment { segment: String, message: String },

    #[error("Subtitle file error at {}: {message}", path.display())]
    SubtitleFile { path: PathBuf, message: String },

    #[error("Renderer execution error: {message}")]
    RendererExecution { message: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using HighlightsError.
pub type HighlightsResult<T> = Result<T, HighlightsError>;

impl HighlightsError {
    pub fn invalid_timestamp(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTimestamp {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_reference(msg: impl Into<String>) -> Self {
        Self::InvalidReference {
            message: msg.into(),
        }
    }

    pub fn dangling_reference(msg: impl Into<String>) -> Self {
        Self::DanglingReference {
            message: msg.into(),
        }
    }

    pub fn invalid_segment(segment: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::InvalidSegment {
            segment: segment.into(),
            message: msg.into(),
        }
    }

    pub fn subtitle_file(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::SubtitleFile {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn renderer(msg: impl Into<String>) -> Self {
        Self::RendererExecution {
            message: msg.into(),
        }
    }

    /// Attach the failing segment to a timestamp error.
    ///
    /// Other variants are returned unchanged.
    pub fn in_segment(self, segment: &str) -> Self {
        match self {
            Self::InvalidTimestamp { value, reason } => Self::InvalidTimestamp {
                value,
                reason: format!("{reason} (in {segment})"),
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_failing_segment() {
        let err = HighlightsError::invalid_segment("clip 2", "start is after end");
        assert_eq!(err.to_string(), "Invalid clip 2 segment: start is after end");
    }

    #[test]
    fn test_in_segment_annotates_timestamp_errors() {
        let err = HighlightsError::invalid_timestamp("00:61:00", "minutes out of range")
            .in_segment("clip 0");
        assert!(err.to_string().contains("(in clip 0)"));
    }

    #[test]
    fn test_in_segment_keeps_unrelated_errors() {
        let err = HighlightsError::renderer("boom").in_segment("opening");
        assert_eq!(err.to_string(), "Renderer execution error: boom");
    }
}

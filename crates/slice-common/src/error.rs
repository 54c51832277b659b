//! Error types shared by the renderer, the pipeline and its workers.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias using SliceError.
pub type SliceResult<T> = Result<T, SliceError>;

/// Failure of a single slice, or of the input handed to the pipeline.
///
/// Every variant carries plain strings so the error survives the trip
/// through a process-mode worker's stdout unchanged.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SliceError {
    /// Malformed or empty volume, mismatched slice shapes, bad data file.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The renderer could not produce an image for the slice.
    #[error("render failed: {0}")]
    Render(String),

    /// Filesystem failure while saving or loading.
    #[error("I/O error: {0}")]
    Io(String),

    /// The task ran past its deadline.
    #[error("timed out after {:.1}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The worker executing the task died or broke protocol.
    #[error("worker failure: {0}")]
    Worker(String),
}

impl SliceError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn worker(msg: impl Into<String>) -> Self {
        Self::Worker(msg.into())
    }

    /// Short machine-friendly name of the variant, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            SliceError::InvalidInput(_) => "invalid_input",
            SliceError::Render(_) => "render",
            SliceError::Io(_) => "io",
            SliceError::Timeout(_) => "timeout",
            SliceError::Worker(_) => "worker",
        }
    }
}

impl From<std::io::Error> for SliceError {
    fn from(err: std::io::Error) -> Self {
        SliceError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SliceError {
    fn from(err: serde_json::Error) -> Self {
        SliceError::InvalidInput(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_survives_json_round_trip() {
        let err = SliceError::Timeout(Duration::from_millis(1500));
        let encoded = serde_json::to_string(&err).unwrap();
        let decoded: SliceError = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, err);
        assert_eq!(decoded.to_string(), "timed out after 1.5s");
    }

    #[test]
    fn test_io_conversion_keeps_message() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: SliceError = io.into();
        assert_eq!(err.kind(), "io");
        assert!(err.to_string().contains("read-only"));
    }
}

//! Error types for the render pipeline.

use crate::report::FailureReport;
use slice_common::SliceError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using PipelineError.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors returned by [`crate::SliceRenderPipeline`].
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The volume was rejected before any work started.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The output directory could not be created.
    #[error("cannot prepare output directory {}: {message}", .path.display())]
    OutputDir { path: PathBuf, message: String },

    /// The worker pool could not be started.
    #[error("worker pool error: {0}")]
    Pool(String),

    /// Invalid pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Some slices failed; the others were written.
    #[error("{0}")]
    Partial(FailureReport),
}

impl PipelineError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// The failure report, if this is a partial failure.
    pub fn failures(&self) -> Option<&FailureReport> {
        match self {
            Self::Partial(report) => Some(report),
            _ => None,
        }
    }
}

impl From<SliceError> for PipelineError {
    fn from(err: SliceError) -> Self {
        match err {
            SliceError::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Config(other.to_string()),
        }
    }
}

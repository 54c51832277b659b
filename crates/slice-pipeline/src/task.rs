//! Units of work and their results.

use serde::{Deserialize, Serialize};
use slice_common::{Slice, SliceError};
use std::path::PathBuf;

/// One slice to render and where to save it.
///
/// Created by the pipeline in input order and consumed exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderTask {
    pub index: usize,
    pub title: String,
    pub path: PathBuf,
    pub slice: Slice,
}

/// What happened to one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub index: usize,
    /// Path written on success.
    pub result: Result<PathBuf, SliceError>,
    pub elapsed_ms: u64,
}

impl TaskOutcome {
    pub fn failed(index: usize, error: SliceError) -> Self {
        Self {
            index,
            result: Err(error),
            elapsed_ms: 0,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

//! Run summaries and failure aggregation.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use slice_common::SliceError;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A slice that could not be rendered or saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub index: usize,
    pub title: String,
    pub error: SliceError,
}

/// Every failure of a run, in index order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReport {
    pub total: usize,
    pub written: usize,
    pub failures: Vec<TaskFailure>,
}

impl FailureReport {
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.index).collect()
    }
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} slices written, {} failed",
            self.written,
            self.total,
            self.failures.len()
        )?;
        for failure in &self.failures {
            write!(f, "\n  slice {} ({}): {}", failure.index, failure.title, failure.error)?;
        }
        Ok(())
    }
}

/// Tasks handled by one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub worker_id: usize,
    /// Process that ran the tasks; the caller's own pid in inherit mode.
    pub pid: u32,
    pub tasks: usize,
}

/// Full account of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderReport {
    pub total: usize,
    /// Files written, in index order.
    pub written: Vec<PathBuf>,
    pub failures: Vec<TaskFailure>,
    pub elapsed: Duration,
    pub workers: Vec<WorkerStats>,
}

impl RenderReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failure_report(&self) -> FailureReport {
        FailureReport {
            total: self.total,
            written: self.written.len(),
            failures: self.failures.clone(),
        }
    }

    /// Number of files written, or [`PipelineError::Partial`] if any task failed.
    pub fn into_result(self) -> PipelineResult<usize> {
        if self.is_success() {
            Ok(self.written.len())
        } else {
            Err(PipelineError::Partial(self.failure_report()))
        }
    }
}

//! Bounded parallel map-and-save over the slices of a volume.
//!
//! [`SliceRenderPipeline::render_all`] turns each slice into a task, fans
//! the tasks out over a fixed number of workers and writes one PNG per
//! slice. Workers are either threads of this process
//! ([`SpawnMode::Inherit`]) or child processes running the
//! `slice-render worker` subcommand ([`SpawnMode::Fresh`]). Each worker
//! runs an initializer once before its first task.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod process;
pub mod report;
pub mod task;
pub mod worker;

pub use config::{PipelineConfig, SpawnMode};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{render_all, SliceRenderPipeline};
pub use process::serve_worker;
pub use report::{FailureReport, RenderReport, TaskFailure, WorkerStats};
pub use task::{RenderTask, TaskOutcome};
pub use worker::{default_worker_init, WorkerContext, WorkerState};

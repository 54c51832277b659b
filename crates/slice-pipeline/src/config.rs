//! Configuration for the render pipeline.

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use slice_common::TitlePattern;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on configured workers.
pub const MAX_WORKERS: usize = 512;

/// How workers are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpawnMode {
    /// Threads of the calling process. Each worker's initializer receives a
    /// clone of the caller's context; anything behind an `Arc` is shared
    /// with the caller, locks included.
    #[default]
    Inherit,
    /// Child processes that start from a clean state and initialize
    /// themselves. Nothing of the caller's memory is inherited.
    Fresh,
}

impl SpawnMode {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "inherit" | "thread" | "threads" => Some(Self::Inherit),
            "fresh" | "process" | "processes" => Some(Self::Fresh),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inherit => "inherit",
            Self::Fresh => "fresh",
        }
    }
}

impl std::fmt::Display for SpawnMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of workers; host parallelism when unset.
    pub workers: Option<usize>,

    /// Worker creation mode.
    pub mode: SpawnMode,

    /// Title / file stem pattern, e.g. `level_{index:03}`.
    pub title_pattern: TitlePattern,

    /// Per-task deadline.
    pub task_timeout: Option<Duration>,

    /// Executable started for [`SpawnMode::Fresh`] workers (run as
    /// `<program> worker`). Defaults to the current executable.
    pub worker_program: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            mode: SpawnMode::Inherit,
            title_pattern: TitlePattern::default(),
            task_timeout: None,
            worker_program: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Unparseable values are ignored and the default kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SLICE_RENDER_WORKERS") {
            if let Ok(n) = val.parse() {
                config.workers = Some(n);
            }
        }

        if let Ok(val) = std::env::var("SLICE_RENDER_MODE") {
            if let Some(mode) = SpawnMode::from_str(&val) {
                config.mode = mode;
            }
        }

        if let Ok(val) = std::env::var("SLICE_RENDER_TITLE_PATTERN") {
            if let Ok(pattern) = TitlePattern::parse(&val) {
                config.title_pattern = pattern;
            }
        }

        if let Ok(val) = std::env::var("SLICE_RENDER_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<f64>() {
                if secs > 0.0 && secs.is_finite() {
                    config.task_timeout = Some(Duration::from_secs_f64(secs));
                }
            }
        }

        if let Ok(val) = std::env::var("SLICE_RENDER_WORKER_PROGRAM") {
            config.worker_program = Some(PathBuf::from(val));
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> PipelineResult<()> {
        if let Some(n) = self.workers {
            if n == 0 {
                return Err(PipelineError::config("workers must be >= 1 when set"));
            }
            if n > MAX_WORKERS {
                return Err(PipelineError::config(format!(
                    "workers must be <= {}, got {}",
                    MAX_WORKERS, n
                )));
            }
        }

        if self.task_timeout == Some(Duration::ZERO) {
            return Err(PipelineError::config("task timeout must be > 0"));
        }

        Ok(())
    }

    /// Worker count for `task_count` tasks: the explicit override, else the
    /// configured count, else host parallelism; never more than the tasks.
    pub fn resolve_workers(&self, requested: Option<usize>, task_count: usize) -> usize {
        let wanted = requested
            .or(self.workers)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            })
            .max(1);
        wanted.min(task_count.max(1))
    }

    /// Executable for process-mode workers.
    pub fn worker_program(&self) -> PipelineResult<PathBuf> {
        match &self.worker_program {
            Some(path) => Ok(path.clone()),
            None => std::env::current_exe().map_err(|e| {
                PipelineError::pool(format!("cannot locate worker executable: {}", e))
            }),
        }
    }
}

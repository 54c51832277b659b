//! The render-and-save pipeline.

use crate::config::{PipelineConfig, SpawnMode};
use crate::error::{PipelineError, PipelineResult};
use crate::pool::{run_pool, WorkerRun};
use crate::process::ProcessWorker;
use crate::report::{RenderReport, TaskFailure, WorkerStats};
use crate::task::{RenderTask, TaskOutcome};
use crate::worker::{default_worker_init, InProcessWorker, InitHook, WorkerContext, WorkerState};
use renderer::{Render, RenderConfig};
use slice_common::{SliceResult, Volume};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Renders every slice of a volume to `{dir}/{title}.png` on a bounded
/// worker pool.
///
/// ```ignore
/// let pipeline = SliceRenderPipeline::new(PipelineConfig::default(), RenderConfig::default())?;
/// let written = pipeline.render_all(volume, Path::new("/tmp/figs"), Some(4))?;
/// ```
#[derive(Clone)]
pub struct SliceRenderPipeline {
    config: PipelineConfig,
    render_config: RenderConfig,
    renderer: Option<Arc<dyn Render>>,
    init_hook: InitHook,
    custom_init: bool,
}

impl SliceRenderPipeline {
    pub fn new(config: PipelineConfig, render_config: RenderConfig) -> PipelineResult<Self> {
        config.validate()?;
        render_config
            .validate()
            .map_err(|e| PipelineError::config(e.to_string()))?;
        Ok(Self {
            config,
            render_config,
            renderer: None,
            init_hook: Arc::new(default_worker_init),
            custom_init: false,
        })
    }

    /// Use `renderer` instead of building a [`renderer::SliceRenderer`] per
    /// worker. Only [`SpawnMode::Inherit`] can share it.
    pub fn with_renderer(mut self, renderer: Arc<dyn Render>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replace the per-worker initializer. It runs once on each worker before
    /// that worker's first task. Only [`SpawnMode::Inherit`] can run it;
    /// process-mode children always run their own built-in initializer.
    pub fn on_worker_start<F>(mut self, hook: F) -> Self
    where
        F: Fn(&WorkerContext) -> SliceResult<WorkerState> + Send + Sync + 'static,
    {
        self.init_hook = Arc::new(hook);
        self.custom_init = true;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Render and save every slice.
    ///
    /// Returns the number of files written. If any slice fails, the others
    /// are still written and [`PipelineError::Partial`] lists every failed
    /// index with its cause.
    pub fn render_all(
        &self,
        volume: Volume,
        output_dir: &Path,
        workers: Option<usize>,
    ) -> PipelineResult<usize> {
        self.render_all_report(volume, output_dir, workers)?
            .into_result()
    }

    /// Like [`Self::render_all`] but returns the full report whether or not
    /// tasks failed. Errors only when the run could not start.
    pub fn render_all_report(
        &self,
        volume: Volume,
        output_dir: &Path,
        workers: Option<usize>,
    ) -> PipelineResult<RenderReport> {
        let started = Instant::now();

        volume.validate()?;
        if let Some(0) = workers {
            return Err(PipelineError::config("workers must be >= 1 when set"));
        }
        if self.config.mode == SpawnMode::Fresh && self.renderer.is_some() {
            return Err(PipelineError::config(
                "a registered renderer cannot cross into fresh worker processes; use inherit mode",
            ));
        }
        if self.config.mode == SpawnMode::Fresh && self.custom_init {
            return Err(PipelineError::config(
                "a custom worker initializer cannot run in fresh worker processes; use inherit mode",
            ));
        }

        std::fs::create_dir_all(output_dir).map_err(|e| PipelineError::OutputDir {
            path: output_dir.to_path_buf(),
            message: e.to_string(),
        })?;

        let tasks = self.build_tasks(volume, output_dir);
        let total = tasks.len();
        let worker_count = self.config.resolve_workers(workers, total);

        info!(
            slices = total,
            workers = worker_count,
            mode = %self.config.mode,
            output_dir = %output_dir.display(),
            "Rendering volume"
        );

        let runs = match self.config.mode {
            SpawnMode::Inherit => {
                let snapshot = self.context_snapshot();
                let hook = &self.init_hook;
                run_pool(&tasks, worker_count, |worker_id| {
                    let mut ctx = snapshot.clone();
                    ctx.worker_id = worker_id;
                    InProcessWorker::start(hook, &ctx)
                })?
            }
            SpawnMode::Fresh => {
                let program = self.config.worker_program()?;
                run_pool(&tasks, worker_count, |worker_id| {
                    ProcessWorker::start(
                        worker_id,
                        program.clone(),
                        self.render_config.clone(),
                        self.config.task_timeout,
                    )
                })?
            }
        };

        let report = assemble_report(&tasks, runs, started);
        if report.is_success() {
            info!(
                written = report.written.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Volume rendered"
            );
        } else {
            warn!(
                written = report.written.len(),
                failed = report.failures.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Volume rendered with failures"
            );
        }
        Ok(report)
    }

    fn build_tasks(&self, volume: Volume, output_dir: &Path) -> Vec<RenderTask> {
        volume
            .into_slices()
            .into_iter()
            .enumerate()
            .map(|(index, slice)| {
                let title = self.config.title_pattern.title(index);
                let path = slice_common::naming::output_path_for_title(output_dir, &title);
                RenderTask {
                    index,
                    title,
                    path,
                    slice,
                }
            })
            .collect()
    }

    fn context_snapshot(&self) -> WorkerContext {
        WorkerContext {
            worker_id: 0,
            mode: self.config.mode,
            render_config: self.render_config.clone(),
            renderer: self.renderer.clone(),
            task_timeout: self.config.task_timeout,
        }
    }
}

fn assemble_report(tasks: &[RenderTask], runs: Vec<WorkerRun>, started: Instant) -> RenderReport {
    let mut workers: Vec<WorkerStats> = runs
        .iter()
        .map(|run| WorkerStats {
            worker_id: run.worker_id,
            pid: run.pid,
            tasks: run.outcomes.len(),
        })
        .collect();
    workers.sort_by_key(|w| w.worker_id);

    let mut outcomes: Vec<TaskOutcome> = runs.into_iter().flat_map(|run| run.outcomes).collect();
    outcomes.sort_by_key(|o| o.index);

    let mut written = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(path) => written.push(path),
            Err(error) => failures.push(TaskFailure {
                index: outcome.index,
                title: tasks
                    .get(outcome.index)
                    .map(|t| t.title.clone())
                    .unwrap_or_default(),
                error,
            }),
        }
    }

    RenderReport {
        total: tasks.len(),
        written,
        failures,
        elapsed: started.elapsed(),
        workers,
    }
}

/// Render `volume` into `output_dir` with default settings.
///
/// `workers` defaults to the host's parallelism.
pub fn render_all(volume: Volume, output_dir: &Path, workers: Option<usize>) -> PipelineResult<usize> {
    SliceRenderPipeline::new(PipelineConfig::default(), RenderConfig::default())?
        .render_all(volume, output_dir, workers)
}

//! Worker initialization and task execution.

use crate::config::SpawnMode;
use crate::pool::Executor;
use crate::task::{RenderTask, TaskOutcome};
use renderer::{Render, RenderConfig, SliceRenderer};
use slice_common::{SliceError, SliceResult};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Snapshot handed to a worker's initializer.
///
/// In [`SpawnMode::Inherit`] every worker gets a clone of the caller's
/// snapshot, so `renderer` is the very object the caller registered. If it
/// guards state with a lock and the caller holds that lock while
/// `render_all` runs, workers that take the lock block forever.
#[derive(Clone)]
pub struct WorkerContext {
    pub worker_id: usize,
    pub mode: SpawnMode,
    pub render_config: RenderConfig,
    /// Renderer registered by the caller, shared rather than rebuilt.
    pub renderer: Option<Arc<dyn Render>>,
    pub task_timeout: Option<Duration>,
}

/// Per-worker state built by the initializer and passed to every task.
pub struct WorkerState {
    pub worker_id: usize,
    pub renderer: Arc<dyn Render>,
    pub tasks_completed: usize,
}

impl WorkerState {
    pub fn new(worker_id: usize, renderer: Arc<dyn Render>) -> Self {
        Self {
            worker_id,
            renderer,
            tasks_completed: 0,
        }
    }
}

/// Initializer invoked once per worker before its first task.
pub type InitHook = Arc<dyn Fn(&WorkerContext) -> SliceResult<WorkerState> + Send + Sync>;

/// Use the caller's renderer if one was registered, otherwise build a
/// [`SliceRenderer`] from the context's figure settings.
pub fn default_worker_init(ctx: &WorkerContext) -> SliceResult<WorkerState> {
    let renderer: Arc<dyn Render> = match &ctx.renderer {
        Some(renderer) => Arc::clone(renderer),
        None => Arc::new(SliceRenderer::new(ctx.render_config.clone())?),
    };
    info!(
        worker_id = ctx.worker_id,
        pid = std::process::id(),
        mode = %ctx.mode,
        "Worker initialized"
    );
    Ok(WorkerState::new(ctx.worker_id, renderer))
}

/// Render `task` and save it to its output path.
///
/// With a deadline, an image that took longer than allowed is dropped
/// without being saved.
pub fn execute_task(state: &mut WorkerState, task: &RenderTask, deadline: Option<Duration>) -> TaskOutcome {
    let started = Instant::now();

    let result = state
        .renderer
        .render(&task.slice, &task.title)
        .and_then(|image| match deadline {
            Some(limit) if started.elapsed() > limit => Err(SliceError::Timeout(limit)),
            _ => state.renderer.save(&image, &task.path),
        })
        .map(|()| task.path.clone());

    state.tasks_completed += 1;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    match &result {
        Ok(path) => debug!(
            worker_id = state.worker_id,
            index = task.index,
            path = %path.display(),
            elapsed_ms,
            "Slice saved"
        ),
        Err(e) => warn!(
            worker_id = state.worker_id,
            index = task.index,
            kind = e.kind(),
            error = %e,
            "Slice failed"
        ),
    }

    TaskOutcome {
        index: task.index,
        result,
        elapsed_ms,
    }
}

/// A worker thread of the calling process.
pub(crate) struct InProcessWorker {
    state: WorkerState,
    deadline: Option<Duration>,
}

impl InProcessWorker {
    pub(crate) fn start(hook: &InitHook, ctx: &WorkerContext) -> SliceResult<Self> {
        let state = hook(ctx)?;
        Ok(Self {
            state,
            deadline: ctx.task_timeout,
        })
    }
}

impl Executor for InProcessWorker {
    fn pid(&self) -> u32 {
        std::process::id()
    }

    fn execute(&mut self, task: &RenderTask) -> TaskOutcome {
        execute_task(&mut self.state, task, self.deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::RenderedImage;
    use slice_common::Slice;
    use std::path::Path;
    use std::sync::Mutex;

    /// Records saves instead of touching the filesystem.
    struct RecordingRenderer {
        saved: Mutex<Vec<String>>,
        delay: Duration,
    }

    impl Render for RecordingRenderer {
        fn render(&self, _slice: &Slice, _title: &str) -> SliceResult<RenderedImage> {
            std::thread::sleep(self.delay);
            RenderedImage::new(1, 1, vec![0, 0, 0, 255])
        }

        fn save(&self, _image: &RenderedImage, path: &Path) -> SliceResult<()> {
            self.saved.lock().unwrap().push(path.display().to_string());
            Ok(())
        }
    }

    fn task(index: usize) -> RenderTask {
        RenderTask {
            index,
            title: format!("level_{:03}", index),
            path: format!("/out/level_{:03}.png", index).into(),
            slice: Slice::matrix(1, 1, vec![0.0]).unwrap(),
        }
    }

    #[test]
    fn test_execute_task_saves_and_counts() {
        let renderer = Arc::new(RecordingRenderer {
            saved: Mutex::new(vec![]),
            delay: Duration::ZERO,
        });
        let mut state = WorkerState::new(0, renderer.clone());

        let outcome = execute_task(&mut state, &task(4), None);

        assert_eq!(outcome.result.unwrap(), Path::new("/out/level_004.png"));
        assert_eq!(state.tasks_completed, 1);
        assert_eq!(renderer.saved.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_slow_render_is_not_saved() {
        let renderer = Arc::new(RecordingRenderer {
            saved: Mutex::new(vec![]),
            delay: Duration::from_millis(50),
        });
        let mut state = WorkerState::new(0, renderer.clone());

        let outcome = execute_task(&mut state, &task(0), Some(Duration::from_millis(5)));

        assert!(matches!(outcome.result, Err(SliceError::Timeout(_))));
        assert!(renderer.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn test_default_init_prefers_registered_renderer() {
        let registered: Arc<dyn Render> = Arc::new(RecordingRenderer {
            saved: Mutex::new(vec![]),
            delay: Duration::ZERO,
        });
        let ctx = WorkerContext {
            worker_id: 3,
            mode: SpawnMode::Inherit,
            render_config: RenderConfig::default(),
            renderer: Some(registered.clone()),
            task_timeout: None,
        };

        let state = default_worker_init(&ctx).unwrap();
        assert_eq!(state.worker_id, 3);
        assert!(Arc::ptr_eq(&state.renderer, &registered));
    }
}

//! Bounded worker pool.
//!
//! Every pool thread runs the same loop: start its executor (the worker's
//! one-time initialization), then claim tasks from a shared cursor until
//! none are left. Tasks are claimed in input order; completion order
//! depends on how long each task takes.

use crate::error::{PipelineError, PipelineResult};
use crate::task::{RenderTask, TaskOutcome};
use slice_common::{SliceError, SliceResult};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, error};

/// Runs tasks on behalf of one worker.
pub(crate) trait Executor {
    /// Process executing the tasks.
    fn pid(&self) -> u32;

    fn execute(&mut self, task: &RenderTask) -> TaskOutcome;
}

/// Everything one worker did.
#[derive(Debug)]
pub(crate) struct WorkerRun {
    pub worker_id: usize,
    pub pid: u32,
    pub outcomes: Vec<TaskOutcome>,
}

pub(crate) fn build_thread_pool(workers: usize) -> PipelineResult<rayon::ThreadPool> {
    if workers == 0 {
        return Err(PipelineError::pool("worker pool needs at least one thread"));
    }

    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("slice-worker-{}", i))
        .build()
        .map_err(|e| PipelineError::pool(format!("failed to build rayon thread pool: {}", e)))
}

/// Text of a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run every task on `workers` threads.
///
/// `start` is called once per worker, on that worker's thread, before it
/// claims anything. A worker whose start fails still drains the queue and
/// reports the start error for each task it claims, so every task ends up
/// with an outcome. Panics in `start` or in a task become that task's
/// error; the worker keeps claiming.
pub(crate) fn run_pool<E, F>(tasks: &[RenderTask], workers: usize, start: F) -> PipelineResult<Vec<WorkerRun>>
where
    E: Executor,
    F: Fn(usize) -> SliceResult<E> + Sync,
{
    let pool = build_thread_pool(workers)?;
    let cursor = AtomicUsize::new(0);

    let runs = pool.broadcast(|ctx| {
        let worker_id = ctx.index();
        let mut executor =
            catch_unwind(AssertUnwindSafe(|| start(worker_id))).unwrap_or_else(|payload| {
                Err(SliceError::worker(format!(
                    "worker initializer panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
        if let Err(e) = &executor {
            error!(worker_id, error = %e, "Worker failed to start");
        }

        let mut outcomes = Vec::new();
        loop {
            let next = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(task) = tasks.get(next) else {
                break;
            };
            debug!(worker_id, index = task.index, "Claimed task");

            let outcome = match executor.as_mut() {
                Ok(executor) => catch_unwind(AssertUnwindSafe(|| executor.execute(task)))
                    .unwrap_or_else(|payload| {
                        let message = panic_message(payload.as_ref());
                        error!(worker_id, index = task.index, panic = %message, "Task panicked");
                        TaskOutcome::failed(
                            task.index,
                            SliceError::render(format!("renderer panicked: {}", message)),
                        )
                    }),
                Err(e) => TaskOutcome::failed(task.index, e.clone()),
            };
            outcomes.push(outcome);
        }

        WorkerRun {
            worker_id,
            pid: executor.as_ref().map(|e| e.pid()).unwrap_or(0),
            outcomes,
        }
    });

    Ok(runs)
}

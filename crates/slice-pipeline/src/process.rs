//! Process-mode workers.
//!
//! The parent starts `<program> worker` and talks to it in JSON lines:
//!
//! ```text
//! parent -> child   {"type":"start","worker_id":0,"render_config":{...}}
//! child  -> parent  {"type":"ready","worker_id":0,"pid":4242}
//! parent -> child   {"type":"task","index":3,"title":"level_003",...}
//! child  -> parent  {"type":"done","index":3,"result":{"Ok":"/out/level_003.png"},...}
//! ```
//!
//! Closing the child's stdin asks it to exit. Logs go to stderr so stdout
//! carries nothing but replies.
//!
//! The child enforces the task deadline itself: a slice that renders too
//! slowly is reported as timed out and not saved. The parent only kills a
//! child that has not replied [`OVERRUN_GRACE`] past the deadline.

use crate::config::SpawnMode;
use crate::pool::Executor;
use crate::task::{RenderTask, TaskOutcome};
use crate::worker::{default_worker_init, execute_task, WorkerContext};
use renderer::{remove_temp_files, RenderConfig};
use serde::{Deserialize, Serialize};
use slice_common::{SliceError, SliceResult};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

/// How long a fresh child may take to report ready.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// How long a child may take to exit after its stdin closes.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long past the deadline the parent waits before killing a child.
const OVERRUN_GRACE: Duration = Duration::from_secs(1);

/// Parent-to-child message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Start {
        worker_id: usize,
        render_config: RenderConfig,
        #[serde(default)]
        task_timeout: Option<Duration>,
    },
    Task(RenderTask),
}

/// Child-to-parent message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerReply {
    Ready { worker_id: usize, pid: u32 },
    Done(TaskOutcome),
    Fatal { message: String },
}

fn write_line<W: Write, T: Serialize>(out: &mut W, message: &T) -> SliceResult<()> {
    serde_json::to_writer(&mut *out, message)
        .map_err(|e| SliceError::worker(format!("failed to encode message: {}", e)))?;
    out.write_all(b"\n")?;
    out.flush()?;
    Ok(())
}

fn parse_request(line: &str) -> SliceResult<WorkerRequest> {
    serde_json::from_str(line)
        .map_err(|e| SliceError::worker(format!("malformed request: {}", e)))
}

/// Child side of the protocol: initialize once, then render tasks until
/// `input` ends.
pub fn serve_worker<R: BufRead, W: Write>(input: R, mut output: W) -> SliceResult<()> {
    let mut lines = input.lines();

    let first = match lines.next() {
        Some(line) => parse_request(&line?)?,
        None => return Ok(()),
    };
    let WorkerRequest::Start {
        worker_id,
        render_config,
        task_timeout,
    } = first
    else {
        let err = SliceError::worker("expected a start message first");
        write_line(&mut output, &WorkerReply::Fatal { message: err.to_string() })?;
        return Err(err);
    };

    let ctx = WorkerContext {
        worker_id,
        mode: SpawnMode::Fresh,
        render_config,
        renderer: None,
        task_timeout,
    };
    let mut state = match default_worker_init(&ctx) {
        Ok(state) => state,
        Err(e) => {
            write_line(&mut output, &WorkerReply::Fatal { message: e.to_string() })?;
            return Err(e);
        }
    };
    write_line(
        &mut output,
        &WorkerReply::Ready {
            worker_id,
            pid: std::process::id(),
        },
    )?;

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_request(&line)? {
            WorkerRequest::Task(task) => {
                let outcome = execute_task(&mut state, &task, task_timeout);
                write_line(&mut output, &WorkerReply::Done(outcome))?;
            }
            WorkerRequest::Start { .. } => {
                return Err(SliceError::worker("worker already started"));
            }
        }
    }

    info!(worker_id, tasks = state.tasks_completed, "Worker input closed, exiting");
    Ok(())
}

enum WireEvent {
    Reply(WorkerReply),
    Garbled(String),
    Closed,
}

fn read_replies(stdout: ChildStdout, tx: Sender<WireEvent>) {
    for line in BufReader::new(stdout).lines() {
        let event = match line {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str(&line) {
                Ok(reply) => WireEvent::Reply(reply),
                Err(e) => WireEvent::Garbled(format!("malformed reply: {}", e)),
            },
            Err(_) => break,
        };
        if tx.send(event).is_err() {
            return;
        }
    }
    let _ = tx.send(WireEvent::Closed);
}

/// A running child process and its reply channel.
struct ChildWorker {
    child: Child,
    stdin: Option<BufWriter<ChildStdin>>,
    replies: Receiver<WireEvent>,
    reader: Option<JoinHandle<()>>,
    pid: u32,
}

impl ChildWorker {
    fn spawn(
        program: &Path,
        worker_id: usize,
        render_config: &RenderConfig,
        task_timeout: Option<Duration>,
    ) -> SliceResult<Self> {
        let mut child = Command::new(program)
            .arg("worker")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| SliceError::worker(format!("failed to start {}: {}", program.display(), e)))?;

        let pid = child.id();
        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let (tx, rx) = mpsc::channel();
        let mut worker = ChildWorker {
            child,
            stdin: stdin.map(BufWriter::new),
            replies: rx,
            reader: None,
            pid,
        };

        let stdout = stdout.ok_or_else(|| SliceError::worker("worker stdout was not captured"))?;
        let reader = thread::Builder::new()
            .name(format!("slice-worker-{}-reader", worker_id))
            .spawn(move || read_replies(stdout, tx))
            .map_err(|e| SliceError::worker(format!("failed to start reply reader: {}", e)))?;
        worker.reader = Some(reader);

        worker.send(&WorkerRequest::Start {
            worker_id,
            render_config: render_config.clone(),
            task_timeout,
        })?;

        match worker.recv(Some(STARTUP_TIMEOUT)) {
            Some(WireEvent::Reply(WorkerReply::Ready { .. })) => Ok(worker),
            Some(WireEvent::Reply(WorkerReply::Fatal { message })) => Err(SliceError::worker(
                format!("worker {} failed to initialize: {}", pid, message),
            )),
            Some(WireEvent::Closed) => Err(SliceError::worker(format!(
                "worker {} exited during startup",
                pid
            ))),
            Some(_) => Err(SliceError::worker(format!(
                "worker {} sent an unexpected startup reply",
                pid
            ))),
            None => Err(SliceError::worker(format!(
                "worker {} did not start within {:?}",
                pid, STARTUP_TIMEOUT
            ))),
        }
    }

    fn send(&mut self, request: &WorkerRequest) -> SliceResult<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| SliceError::worker("worker stdin is closed"))?;
        write_line(stdin, request)
    }

    /// Next event, or `None` if `timeout` passed first.
    fn recv(&self, timeout: Option<Duration>) -> Option<WireEvent> {
        match timeout {
            Some(timeout) => match self.replies.recv_timeout(timeout) {
                Ok(event) => Some(event),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(WireEvent::Closed),
            },
            None => Some(self.replies.recv().unwrap_or(WireEvent::Closed)),
        }
    }

    /// Kill the child now and describe how it ended.
    fn kill(mut self) -> String {
        let _ = self.child.kill();
        match self.child.wait() {
            Ok(status) => status.to_string(),
            Err(e) => format!("unknown status: {}", e),
        }
    }
}

impl Drop for ChildWorker {
    fn drop(&mut self) {
        // EOF on stdin asks the child to exit.
        self.stdin.take();

        let give_up = Instant::now() + SHUTDOWN_GRACE;
        loop {
            match self.child.try_wait() {
                Ok(Some(_)) => break,
                Ok(None) if Instant::now() < give_up => thread::sleep(Duration::from_millis(10)),
                _ => {
                    warn!(pid = self.pid, "Worker process did not exit, killing it");
                    let _ = self.child.kill();
                    let _ = self.child.wait();
                    break;
                }
            }
        }

        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Parent-side handle for one process-mode worker.
///
/// A child that dies or overruns its deadline is killed and a new one is
/// started for the next task.
pub(crate) struct ProcessWorker {
    worker_id: usize,
    program: PathBuf,
    render_config: RenderConfig,
    deadline: Option<Duration>,
    child: Option<ChildWorker>,
}

impl ProcessWorker {
    pub(crate) fn start(
        worker_id: usize,
        program: PathBuf,
        render_config: RenderConfig,
        deadline: Option<Duration>,
    ) -> SliceResult<Self> {
        let mut worker = Self {
            worker_id,
            program,
            render_config,
            deadline,
            child: None,
        };
        worker.ensure_child()?;
        Ok(worker)
    }

    fn ensure_child(&mut self) -> SliceResult<&mut ChildWorker> {
        if self.child.is_none() {
            let child = ChildWorker::spawn(
                &self.program,
                self.worker_id,
                &self.render_config,
                self.deadline,
            )?;
            info!(worker_id = self.worker_id, pid = child.pid, "Worker process started");
            self.child = Some(child);
        }
        self.child
            .as_mut()
            .ok_or_else(|| SliceError::worker("worker process unavailable"))
    }

    fn discard_child(&mut self) -> String {
        match self.child.take() {
            Some(child) => child.kill(),
            None => "not running".to_string(),
        }
    }

    /// Outcome of `task` after its child was killed or died: remove the
    /// child's half-written temp files, and count the slice as written if
    /// its file was replaced before the child went away.
    fn settle_lost_task(
        &self,
        task: &RenderTask,
        pid: u32,
        previous: Option<SystemTime>,
        started: Instant,
        error: SliceError,
    ) -> TaskOutcome {
        remove_temp_files(&task.path, pid);

        let current = modified_time(&task.path);
        let result = if current.is_some() && current != previous {
            warn!(
                worker_id = self.worker_id,
                pid,
                index = task.index,
                "Slice was saved before its worker process went away"
            );
            Ok(task.path.clone())
        } else {
            Err(error)
        };

        TaskOutcome {
            index: task.index,
            result,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    fn run(&mut self, task: &RenderTask) -> SliceResult<TaskOutcome> {
        let deadline = self.deadline;
        let previous = modified_time(&task.path);
        let child = self.ensure_child()?;
        let started = Instant::now();
        let pid = child.pid;

        if let Err(e) = child.send(&WorkerRequest::Task(task.clone())) {
            let status = self.discard_child();
            return Err(SliceError::worker(format!(
                "could not send slice {} to worker {} ({}): {}",
                task.index, pid, status, e
            )));
        }

        let remaining = deadline.map(|d| (d + OVERRUN_GRACE).saturating_sub(started.elapsed()));
        match child.recv(remaining) {
            Some(WireEvent::Reply(WorkerReply::Done(outcome))) if outcome.index == task.index => {
                debug!(worker_id = self.worker_id, pid, index = task.index, "Reply received");
                Ok(outcome)
            }
            None => {
                let limit = deadline.unwrap_or_default();
                warn!(
                    worker_id = self.worker_id,
                    pid,
                    index = task.index,
                    "Slice exceeded its deadline, killing worker process"
                );
                self.discard_child();
                Ok(self.settle_lost_task(task, pid, previous, started, SliceError::Timeout(limit)))
            }
            Some(WireEvent::Closed) => {
                let status = self.discard_child();
                let error = SliceError::worker(format!(
                    "worker process {} exited ({}) while rendering slice {}",
                    pid, status, task.index
                ));
                Ok(self.settle_lost_task(task, pid, previous, started, error))
            }
            Some(WireEvent::Garbled(message)) => {
                self.discard_child();
                Err(SliceError::worker(message))
            }
            Some(WireEvent::Reply(other)) => {
                self.discard_child();
                Err(SliceError::worker(format!(
                    "unexpected reply for slice {}: {:?}",
                    task.index, other
                )))
            }
        }
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl Executor for ProcessWorker {
    fn pid(&self) -> u32 {
        self.child.as_ref().map(|c| c.pid).unwrap_or(0)
    }

    fn execute(&mut self, task: &RenderTask) -> TaskOutcome {
        let started = Instant::now();
        match self.run(task) {
            Ok(outcome) => outcome,
            Err(error) => TaskOutcome {
                index: task.index,
                result: Err(error),
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        }
    }
}

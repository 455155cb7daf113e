//! Subprocess supervisor.
//!
//! Owns a bounded pool of concurrently-running child processes, admitted
//! through a `tokio::sync::Semaphore` sized to the configured concurrency
//! ceiling.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bscan_core::{truncate_cmd, BscanError};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Live command registry, keyed by an opaque handle id.
type RunningSet = Arc<Mutex<HashMap<u64, String>>>;

/// Bounded subprocess pool.
pub struct Supervisor {
    semaphore: Arc<Semaphore>,
    running: RunningSet,
    next_id: AtomicU64,
    shutting_down: Arc<AtomicBool>,
    cmd_print_width: usize,
}

impl Supervisor {
    /// Builds a supervisor admitting at most `max_concurrency` concurrent
    /// live processes.
    pub fn new(max_concurrency: usize, cmd_print_width: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            running: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
            shutting_down: Arc::new(AtomicBool::new(false)),
            cmd_print_width,
        }
    }

    /// Current number of live (not-yet-`wait`ed) subprocess handles.
    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }

    /// Commands currently running, truncated for display (used by the
    /// verbose status reporter).
    pub fn running_commands(&self) -> Vec<String> {
        self.running
            .lock()
            .values()
            .map(|c| truncate_cmd(c, self.cmd_print_width))
            .collect()
    }

    /// Refuses further spawns. Already-admitted processes are unaffected;
    /// callers must still await their exit codes.
    pub fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Spawns `sh -c <cmd>`, suspending the caller if the supervisor is
    /// already at its concurrency ceiling. FIFO-fair because
    /// `tokio::sync::Semaphore` queues waiters in acquisition order.
    pub async fn spawn(&self, cmd: impl Into<String>) -> Result<SubprocessHandle, BscanError> {
        let cmd = cmd.into();
        if self.shutting_down.load(Ordering::SeqCst) {
            return Err(BscanError::Subprocess(format!(
                "supervisor is shutting down, refused: {}",
                truncate_cmd(&cmd, self.cmd_print_width)
            )));
        }

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| BscanError::Internal(format!("semaphore closed: {e}")))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                BscanError::Subprocess(format!(
                    "failed to spawn `{}`: {e}",
                    truncate_cmd(&cmd, self.cmd_print_width)
                ))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BscanError::Internal("spawned child has no stdout pipe".to_string()))?;
        let lines = BufReader::new(stdout).lines();

        // Tools like `enum4linux`/`smbmap`/`onesixtyone` write to stderr
        // without redirecting it into stdout; a pipe nobody reads fills its
        // OS buffer and the child blocks on write(), so stdout never reaches
        // EOF. Drain stderr on its own task so it never backs up.
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BscanError::Internal("spawned child has no stderr pipe".to_string()))?;
        let stderr_drain = tokio::spawn(async move {
            let mut stderr_lines = BufReader::new(stderr).lines();
            while matches!(stderr_lines.next_line().await, Ok(Some(_))) {}
        });

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.running.lock().insert(id, cmd.clone());

        Ok(SubprocessHandle {
            id,
            command: cmd,
            child,
            lines,
            stderr_drain,
            running: Arc::clone(&self.running),
            _permit: permit,
        })
    }
}

/// A single spawned subprocess: its command, a line-oriented stdout stream,
/// and its eventual exit code.
pub struct SubprocessHandle {
    id: u64,
    pub command: String,
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr_drain: JoinHandle<()>,
    running: RunningSet,
    _permit: OwnedSemaphorePermit,
}

impl SubprocessHandle {
    /// Reads the next stdout line, or `None` once the stream is drained.
    pub async fn next_line(&mut self) -> Result<Option<String>, BscanError> {
        self.lines
            .next_line()
            .await
            .map_err(|e| BscanError::Subprocess(format!("reading stdout: {e}")))
    }

    /// Awaits process exit. A non-zero status is reported, not an error —
    /// callers log it at warning severity.
    pub async fn wait_exit_code(mut self) -> Result<i32, BscanError> {
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| BscanError::Subprocess(format!("awaiting exit: {e}")))?;
        let _ = self.stderr_drain.await;
        self.running.lock().remove(&self.id);
        Ok(status.code().unwrap_or(-1))
    }
}

impl Drop for SubprocessHandle {
    fn drop(&mut self) {
        self.running.lock().remove(&self.id);
    }
}

//! Deadline-bound subprocess execution.
//!
//! [`run_command`] is the one place child processes are spawned. The caller
//! sets the program and arguments; working directory, extra environment and
//! the deadline come from [`RunOptions`]. The child runs in its own process
//! group. When the deadline fires, or once the child exits on its own, the
//! whole group is killed so nothing it started can outlive the call or keep
//! its output pipes open.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::executor::{RunOptions, ScriptError, ScriptOutput};
use crate::execution::SIGNAL_EXIT_CODE;

/// Maximum stdout or stderr size captured per stream (10 MiB).
///
/// Output beyond the limit is drained and discarded so the child never
/// blocks on a full pipe.
pub const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Minimum time allowed for draining output after the child exits.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Output collected so far from one stream.
type SharedBuffer = Arc<Mutex<Vec<u8>>>;

/// Spawn `cmd`, capture stdout/stderr, and enforce the deadline.
///
/// Returns [`ScriptError::Timeout`] when the deadline fires; by then the
/// process group has been killed and reaped, reading has stopped, and the
/// error carries whatever output arrived before the deadline.
pub async fn run_command(cmd: &mut Command, options: RunOptions) -> Result<ScriptOutput, ScriptError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    for (key, value) in &options.env_vars {
        cmd.env(key, value);
    }

    if let Some(dir) = &options.working_directory {
        cmd.current_dir(dir);
    }

    let start = Instant::now();

    let mut child = cmd.spawn()?;
    // The group id equals the child's pid; it is gone from `child` once reaped.
    let group = child.id().and_then(|pid| i32::try_from(pid).ok());

    let stdout_buf = SharedBuffer::default();
    let stderr_buf = SharedBuffer::default();
    let mut stdout_task = tokio::spawn(read_stream(child.stdout.take(), Arc::clone(&stdout_buf)));
    let mut stderr_task = tokio::spawn(read_stream(child.stderr.take(), Arc::clone(&stderr_buf)));

    let wait_result = tokio::time::timeout(options.timeout, child.wait()).await;

    match wait_result {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;

            // Background processes left by the script would hold the pipes open.
            kill_group(group);
            let drain = options
                .timeout
                .saturating_sub(start.elapsed())
                .max(OUTPUT_DRAIN_GRACE);
            let drained = tokio::time::timeout(drain, async {
                let _ = (&mut stdout_task).await;
                let _ = (&mut stderr_task).await;
            })
            .await;
            if drained.is_err() {
                tracing::warn!(
                    drain_ms = drain.as_millis() as u64,
                    "Output pipes still open after the process exited; truncating capture",
                );
                stop_reading(&stdout_task, &stderr_task);
            }

            Ok(ScriptOutput {
                stdout: take_lossy(&stdout_buf),
                stderr: take_lossy(&stderr_buf),
                exit_code: status.code().unwrap_or(SIGNAL_EXIT_CODE),
                duration_ms,
            })
        }
        Ok(Err(e)) => {
            stop_reading(&stdout_task, &stderr_task);
            kill_process_group(&mut child, group).await;
            Err(ScriptError::IoError(e))
        }
        Err(_elapsed) => {
            stop_reading(&stdout_task, &stderr_task);
            kill_process_group(&mut child, group).await;
            Err(ScriptError::Timeout {
                elapsed_ms: start.elapsed().as_millis() as u64,
                stdout: take_lossy(&stdout_buf),
                stderr: take_lossy(&stderr_buf),
            })
        }
    }
}

fn stop_reading(stdout_task: &JoinHandle<()>, stderr_task: &JoinHandle<()>) {
    stdout_task.abort();
    stderr_task.abort();
}

/// Send `SIGKILL` to every process in the group.
fn kill_group(group: Option<i32>) {
    #[cfg(unix)]
    if let Some(pgid) = group {
        // SAFETY: `kill` has no memory-safety preconditions; a negative pid
        // targets the process group created by `process_group(0)`.
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    #[cfg(not(unix))]
    let _ = group;
}

/// Kill the child's whole process group, then the child itself, and reap it.
async fn kill_process_group(child: &mut Child, group: Option<i32>) {
    kill_group(group);

    if let Err(e) = child.kill().await {
        tracing::debug!(error = %e, "Child already exited after process-group kill");
    }
}

/// Move the collected bytes out of `buf` as text.
fn take_lossy(buf: &SharedBuffer) -> String {
    let bytes = match buf.lock() {
        Ok(mut guard) => std::mem::take(&mut *guard),
        Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
    };
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Append a stream to `buf` chunk by chunk, up to [`MAX_OUTPUT_BYTES`], and
/// drain the rest.
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>, buf: SharedBuffer) {
    let Some(mut h) = handle else {
        return;
    };
    let mut chunk = vec![0u8; READ_CHUNK_BYTES];
    loop {
        let n = match h.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        let Ok(mut collected) = buf.lock() else {
            return;
        };
        let room = MAX_OUTPUT_BYTES.saturating_sub(collected.len());
        collected.extend_from_slice(&chunk[..n.min(room)]);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

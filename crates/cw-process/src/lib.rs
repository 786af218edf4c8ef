//! Process supervision: spawn a child with redirected stdio, enforce
//! wall-clock and memory limits via two concurrent watchdogs, capture both
//! streams, and attribute the cause of death race-free.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use cw_core::types::{
    EXIT_KILLED_BY_DEADLINE, EXIT_KILLED_BY_MEMORY, GlobalLimits, ProcessOutcome,
};
use cw_resource::memwatch::{MemoryWatchdog, kill_process_group};

/// Exit codes the system `timeout` wrapper reports for a child it killed.
const TIMEOUT_WRAPPER_EXIT_CODES: [i32; 2] = [124, 137];

/// One supervised run: command, limits, and optional stdin payload.
#[derive(Debug, Clone)]
pub struct RunSpec {
    /// Absolute or PATH-resolvable command.
    pub command: String,
    pub args: Vec<String>,
    /// Working directory for the child; must exist and be writable.
    pub working_dir: PathBuf,
    /// Payload written to the child's stdin. `None` means the child sees
    /// EOF immediately (stdin is `/dev/null`).
    pub stdin: Option<Vec<u8>>,
    /// Per-run wall-clock limit in whole seconds.
    pub time_limit_sec: u64,
    /// Per-run resident-set cap in megabytes.
    pub max_memory_mb: u64,
    /// Process-wide ceilings; the effective limits are the minimum of the
    /// per-run values and these.
    pub global: GlobalLimits,
}

/// Launch and supervise one child to completion.
///
/// Never returns an error: everything observable about the child, including
/// a failure to spawn it, is encoded in the [`ProcessOutcome`]. The child is
/// confirmed reaped (wait returned or kill delivered and waited) before this
/// function returns, and both streams are drained fully.
///
/// Cause attribution order after both watchdogs have quiesced:
/// 1. memory watchdog tripped: exit code −2, `timed_out` forced false
/// 2. deadline elapsed without a clean exit: exit code −1
/// 3. the child's own exit code, with the system `timeout` wrapper's
///    124/137 reclassified as a deadline kill
pub async fn run(spec: RunSpec) -> ProcessOutcome {
    let deadline = Duration::from_secs(spec.time_limit_sec.min(spec.global.max_time_sec).max(1));
    let memory_limit_mb = spec.max_memory_mb.min(spec.global.max_memory_mb);

    let mut cmd = Command::new(&spec.command);
    cmd.args(&spec.args)
        .current_dir(&spec.working_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if spec.stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.kill_on_drop(true);

    // Isolate the child in its own process group so the watchdogs can kill
    // the whole descendant tree with one signal.
    // SAFETY: setsid() is async-signal-safe and runs before exec.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    let started = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(error) => {
            warn!(command = %spec.command, %error, "failed to spawn supervised child");
            return ProcessOutcome::spawn_failure();
        }
    };
    let pid = child.id();

    feed_stdin(&mut child, spec.stdin);

    // Take the stream handles before waiting; draining runs concurrently
    // with both watchdogs so a chatty child can never fill a pipe and hang.
    let stdout_task = drain_stream(child.stdout.take());
    let stderr_task = drain_stream(child.stderr.take());

    let memory_tripped = Arc::new(AtomicBool::new(false));
    let watchdog = pid.map(|pid| {
        MemoryWatchdog::start(pid, memory_limit_mb, Arc::clone(&memory_tripped))
    });

    let mut deadline_fired = false;
    let status = match tokio::time::timeout(deadline, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(error)) => {
            warn!(%error, "wait on supervised child failed");
            None
        }
        Err(_) => {
            // Deadline elapsed. Memory keeps precedence if its flag is
            // already up; otherwise this is a timeout kill.
            if !memory_tripped.load(Ordering::SeqCst) {
                deadline_fired = true;
            }
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            match child.wait().await {
                Ok(status) => Some(status),
                Err(error) => {
                    warn!(%error, "wait after deadline kill failed");
                    None
                }
            }
        }
    };

    if let Some(watchdog) = watchdog {
        watchdog.stop().await;
    }

    // Killing the group closed the write ends, so both drains terminate.
    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let duration_ms = started.elapsed().as_millis() as u64;
    let memory_exceeded = memory_tripped.load(Ordering::SeqCst);

    let (exit_code, timed_out) = attribute(
        &spec.command,
        status.as_ref().and_then(|s| s.code()),
        memory_exceeded,
        deadline_fired,
    );

    debug!(
        command = %spec.command,
        exit_code,
        duration_ms,
        timed_out,
        memory_exceeded,
        "supervised child finished"
    );

    ProcessOutcome {
        exit_code,
        stdout,
        stderr,
        duration_ms,
        timed_out,
        memory_exceeded,
    }
}

/// Map the observed end state to `(exit_code, timed_out)` in precedence
/// order. Memory wins over the deadline even when both tripped.
fn attribute(
    command: &str,
    exit_code: Option<i32>,
    memory_exceeded: bool,
    deadline_fired: bool,
) -> (i32, bool) {
    if memory_exceeded {
        return (EXIT_KILLED_BY_MEMORY, false);
    }
    if deadline_fired {
        return (EXIT_KILLED_BY_DEADLINE, true);
    }
    match exit_code {
        Some(code) => {
            // The inner `timeout` wrapper fires before our own deadline and
            // surfaces as a plain exit code; reclassify it.
            if is_timeout_wrapper(command) && TIMEOUT_WRAPPER_EXIT_CODES.contains(&code) {
                (EXIT_KILLED_BY_DEADLINE, true)
            } else {
                (code, false)
            }
        }
        // Signal-killed with no watchdog flag (e.g. an out-of-band OOM
        // kill), or wait itself failed. Surfaces as a runtime error.
        None => (cw_core::types::EXIT_CODE_UNAVAILABLE, false),
    }
}

fn is_timeout_wrapper(command: &str) -> bool {
    command == "timeout" || command.ends_with("/timeout")
}

/// Write the payload on a separate task, then close stdin. The write never
/// blocks output draining; a child that exits early just breaks the pipe.
fn feed_stdin(child: &mut Child, payload: Option<Vec<u8>>) {
    let Some(data) = payload else {
        return;
    };
    let Some(mut stdin) = child.stdin.take() else {
        warn!("stdin payload provided but no piped stdin handle available");
        return;
    };
    tokio::spawn(async move {
        if let Err(error) = stdin.write_all(&data).await {
            debug!(%error, "stdin write ended early");
        }
        if let Err(error) = stdin.shutdown().await {
            debug!(%error, "stdin close failed");
        }
    });
}

/// Read a stream to EOF on its own task; decode as UTF-8 (lossy) and
/// normalise CR LF to LF on the way in.
fn drain_stream<R>(stream: Option<R>) -> tokio::task::JoinHandle<String>
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut stream) = stream else {
            return String::new();
        };
        let mut buf = Vec::new();
        if let Err(error) = stream.read_to_end(&mut buf).await {
            debug!(%error, "stream drain ended early");
        }
        String::from_utf8_lossy(&buf).replace("\r\n", "\n")
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

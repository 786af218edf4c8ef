//! RSS polling watchdog.
//!
//! Samples the resident set of a child's whole process subtree via
//! `sysinfo` and kills the child's process group when the cap is
//! breached. The supervised process is usually a thin wrapper (the system
//! `timeout` binary) whose own RSS is negligible — the allocation to
//! measure lives in its descendants, so every sample walks the parent
//! chain from the supervised PID and sums the subtree. The trip flag is
//! stored *before* the kill signal is sent so the supervisor's post-exit
//! classification always observes it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Delay before the first RSS sample, letting the child settle after exec.
pub const WARMUP: Duration = Duration::from_millis(100);

/// Interval between RSS samples.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Background task that polls a child subtree's RSS against a megabyte cap.
///
/// On breach it stores `true` into the shared trip flag, SIGKILLs the
/// child's process group, and stops polling. Stops on its own when the
/// process disappears.
pub struct MemoryWatchdog {
    stop_flag: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

impl MemoryWatchdog {
    /// Start watching `pid` (and every descendant) against `limit_mb`.
    ///
    /// `tripped` is shared with the supervisor; it is the single source of
    /// truth for memory-kill attribution.
    pub fn start(pid: u32, limit_mb: u64, tripped: Arc<AtomicBool>) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&stop_flag);

        let handle = tokio::spawn(async move {
            watch_loop(pid, limit_mb, tripped, stop).await;
        });

        Self { stop_flag, handle }
    }

    /// Stop polling and wait for the watchdog task to quiesce.
    pub async fn stop(self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        let _ = self.handle.await;
    }
}

async fn watch_loop(pid: u32, limit_mb: u64, tripped: Arc<AtomicBool>, stop: Arc<AtomicBool>) {
    let limit_bytes = limit_mb.saturating_mul(1024 * 1024);
    let root = Pid::from_u32(pid);
    let mut sys = System::new();

    tokio::time::sleep(WARMUP).await;

    loop {
        if stop.load(Ordering::Relaxed) {
            return;
        }

        // Children of the wrapper come and go between samples, so refresh
        // the whole table and rediscover the subtree each time.
        sys.refresh_processes(ProcessesToUpdate::All, true);
        if sys.process(root).is_none() {
            // Process exited between samples.
            return;
        }

        let rss_bytes = subtree_rss_bytes(&sys, root);
        if rss_bytes > limit_bytes {
            // Flag first, then kill: the supervisor reads the flag after
            // the child is reaped.
            tripped.store(true, Ordering::SeqCst);
            warn!(
                pid,
                rss_mb = rss_bytes / 1024 / 1024,
                limit_mb,
                "subtree RSS over limit, killing process group"
            );
            kill_process_group(pid);
            return;
        }

        debug!(pid, rss_mb = rss_bytes / 1024 / 1024, limit_mb, "RSS sample");
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Sum RSS over `root` and every transitive descendant.
///
/// Breadth-first walk over the process table by parent links; a process
/// whose parent died and was reparented falls out of the subtree, which
/// matches what the group kill can reach anyway.
fn subtree_rss_bytes(sys: &System, root: Pid) -> u64 {
    let mut members = vec![root];
    let mut total = 0u64;
    let mut idx = 0;

    while idx < members.len() {
        let current = members[idx];
        idx += 1;

        if let Some(process) = sys.process(current) {
            total = total.saturating_add(process.memory());
        }
        for (pid, process) in sys.processes() {
            if process.parent() == Some(current) && !members.contains(pid) {
                members.push(*pid);
            }
        }
    }

    total
}

/// SIGKILL the process **group** (negative PID), taking the whole
/// descendant tree with it. Failures are logged, never raised.
pub fn kill_process_group(pid: u32) {
    #[cfg(unix)]
    {
        // SAFETY: kill() is async-signal-safe; negative PID targets the group.
        let ret = unsafe { libc::kill(-(pid as i32), libc::SIGKILL) };
        if ret != 0 {
            warn!(
                pid,
                error = %std::io::Error::last_os_error(),
                "failed to kill process group"
            );
        }
    }
    #[cfg(not(unix))]
    let _ = pid;
}

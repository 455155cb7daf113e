//! Status reporter.
//!
//! A single background task that wakes every 0.5s, accumulates elapsed
//! time, and emits one progress line each time it reaches `status_interval`,
//! driven by `tokio::time::sleep` rather than a busy loop.

use std::sync::Arc;
use std::time::Duration;

use crate::runtime::Runtime;

const WAKE_INTERVAL: Duration = Duration::from_millis(500);

/// Runs until `rt.active_target_count()` reaches zero on a wake cycle.
/// Callers should `tokio::spawn` this after admitting at least one target
/// so it does not observe a transient zero-targets state at startup.
pub async fn run_status_reporter(rt: Arc<Runtime>, status_interval: i64, verbose: bool) {
    if status_interval <= 0 {
        return;
    }
    let interval = Duration::from_secs(status_interval as u64);
    let mut accumulated = Duration::ZERO;

    loop {
        tokio::time::sleep(WAKE_INTERVAL).await;
        accumulated += WAKE_INTERVAL;

        if rt.active_target_count() == 0 {
            return;
        }

        if accumulated >= interval {
            accumulated = Duration::ZERO;
            let stats = rt.stats();
            log::info!(
                "Scan status: {} spawned subprocess(es) currently running across {} target(s)",
                stats.total_subprocs,
                stats.active_targets
            );
            if verbose {
                for cmd in rt.supervisor.running_commands() {
                    log::info!("  {cmd}");
                }
            }
        }
    }
}

//! Process stats reporter
//!
//! Periodically logs uptime and resident memory while a long task runs, so a
//! stalled or ballooning run is visible in the logs.

use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::info;

/// Handle to the background reporter task
pub struct StatsReporter {
    handle: Option<JoinHandle<()>>,
}

impl StatsReporter {
    /// Start reporting every `interval`; a zero interval disables reporting
    pub fn spawn(interval: Duration) -> Self {
        if interval.is_zero() {
            return Self { handle: None };
        }

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                info!(
                    uptime_secs = started.elapsed().as_secs(),
                    rss_kb = ?resident_memory_kb(),
                    "Process stats"
                );
            }
        });

        Self { handle: Some(handle) }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the reporter
    pub fn stop(self) {
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

/// Resident set size from `/proc/self/status` (Linux only)
pub fn resident_memory_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|value| value.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

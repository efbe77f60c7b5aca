//! Resource watcher: samples resident memory and thread count, publishes
//! gauges, and flips warning flags when a configured threshold is exceeded.

use std::time::Duration;

use sysinfo::{Pid, ProcessRefreshKind, RefreshKind, System};
use tokio::sync::broadcast;

use mailwarden_common::{internal, Signal};

#[derive(Debug, Clone, Copy)]
pub struct ResourceWatcherConfig {
    pub sample_interval_secs: u64,
    pub memory_warning_mb: u64,
    pub thread_warning_count: u64,
    pub enabled: bool,
}

/// Low-frequency loop sampling this process's own resident memory and
/// thread count. Warnings are advisory only: they never disable a probe.
pub struct ResourceWatcher {
    config: ResourceWatcherConfig,
}

impl ResourceWatcher {
    #[must_use]
    pub const fn new(config: ResourceWatcherConfig) -> Self {
        Self { config }
    }

    pub async fn run(self, mut cancel: broadcast::Receiver<Signal>) {
        if !self.config.enabled {
            internal!(level = INFO, "resource watcher disabled by configuration");
            return;
        }

        let pid = Pid::from_u32(std::process::id());
        let mut system = System::new_with_specifics(
            RefreshKind::nothing().with_processes(ProcessRefreshKind::everything()),
        );

        loop {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(self.config.sample_interval_secs)) => {}
                _ = cancel.recv() => {
                    internal!(level = INFO, "resource watcher cancelled, terminating");
                    return;
                }
            }

            system.refresh_processes(sysinfo::ProcessesToUpdate::Some(&[pid]), true);

            let Some(process) = system.process(pid) else {
                internal!(level = WARN, "resource watcher could not read its own process info");
                continue;
            };

            let memory_mb = process.memory() as f64 / (1024.0 * 1024.0);
            let thread_count = count_threads() as f64;

            if mailwarden_metrics::is_enabled() {
                let resource = &mailwarden_metrics::metrics().resource;
                resource.set_memory_usage_mb(memory_mb);
                resource.set_thread_count(thread_count);

                let memory_warn = memory_mb > self.config.memory_warning_mb as f64;
                let thread_warn = thread_count > self.config.thread_warning_count as f64;
                resource.set_warning("memory", memory_warn);
                resource.set_warning("threads", thread_warn);

                if memory_warn {
                    tracing::warn!(memory_mb, threshold = self.config.memory_warning_mb, "memory warning threshold exceeded");
                }
                if thread_warn {
                    tracing::warn!(thread_count, threshold = self.config.thread_warning_count, "thread warning threshold exceeded");
                }
            }
        }
    }
}

/// Counts this process's OS threads. `/proc/self/status` carries a
/// `Threads:` line on Linux; other platforms report 1, since the worker
/// pool size is not exposed the same way everywhere this runs.
#[cfg(target_os = "linux")]
fn count_threads() -> usize {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status.lines().find_map(|line| {
                line.strip_prefix("Threads:")
                    .and_then(|rest| rest.trim().parse().ok())
            })
        })
        .unwrap_or(1)
}

#[cfg(not(target_os = "linux"))]
const fn count_threads() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_watcher_returns_immediately() {
        let watcher = ResourceWatcher::new(ResourceWatcherConfig {
            sample_interval_secs: 9999,
            memory_warning_mb: 512,
            thread_warning_count: 100,
            enabled: false,
        });
        let (_tx, rx) = broadcast::channel(1);
        tokio::time::timeout(Duration::from_secs(1), watcher.run(rx))
            .await
            .expect("disabled watcher must not block");
    }
}

//! Probe supervisor: spawns, tracks, and gracefully stops every probe kernel.

use std::sync::Arc;
use std::time::Duration;

use mailwarden_common::{internal, Signal};
use mailwarden_health::ProbeRegistry;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

use crate::kernel::Kernel;

/// Owns the single process-wide cancellation broadcast and the set of
/// in-flight kernel tasks. The exposition server and resource watcher
/// subscribe to the same broadcast via [`Supervisor::subscribe`] so that one
/// signal drains every worker.
pub struct Supervisor {
    cancel: broadcast::Sender<Signal>,
    registry: Arc<ProbeRegistry>,
}

impl Supervisor {
    #[must_use]
    pub fn new(registry: Arc<ProbeRegistry>) -> Self {
        let (cancel, _) = broadcast::channel(16);
        Self { cancel, registry }
    }

    /// A read-only view of kernel health, safe for the exposition server to
    /// read concurrently with kernel mutation.
    #[must_use]
    pub fn registry(&self) -> Arc<ProbeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Subscribes to the process-wide cancellation signal.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.cancel.subscribe()
    }

    /// Spawns one task per kernel, each on its own schedule.
    #[must_use]
    pub fn spawn(&self, kernels: Vec<Kernel>) -> JoinSet<()> {
        let mut tasks = JoinSet::new();
        for kernel in kernels {
            let cancel = self.cancel.subscribe();
            tasks.spawn(kernel.run(cancel));
        }
        tasks
    }

    /// Broadcasts cancellation and waits up to `grace` for every kernel task
    /// to exit. Stragglers are logged and abandoned rather than awaited
    /// indefinitely.
    pub async fn shutdown(&self, mut tasks: JoinSet<()>, grace: Duration) {
        let outstanding = tasks.len();
        if self.cancel.send(Signal::Shutdown).is_err() {
            internal!(level = WARN, "cancellation broadcast had no subscribers");
        }

        let drained = tokio::time::timeout(grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = tasks.len(),
                outstanding,
                "grace period elapsed before all probe kernels exited; abandoning stragglers"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelConfig;
    use crate::probe::Probe;
    use async_trait::async_trait;
    use mailwarden_resilience::{BreakerConfig, Cause};

    struct Immediate;

    #[async_trait]
    impl Probe for Immediate {
        fn name(&self) -> &'static str {
            "immediate"
        }

        async fn check(&self, _timeout: Duration) -> Result<(), Cause> {
            Ok(())
        }
    }

    fn config() -> KernelConfig {
        KernelConfig {
            base_interval_secs: 0,
            backoff_base_interval_secs: 0,
            breaker: BreakerConfig::new(5, 60),
            backoff_multiplier: 1.0,
            backoff_max_interval_secs: 1,
            backoff_max_failures: 5,
            categorization_enabled: true,
        }
    }

    #[tokio::test]
    async fn test_shutdown_drains_all_kernels_within_grace() {
        let registry = Arc::new(ProbeRegistry::new());
        let supervisor = Supervisor::new(Arc::clone(&registry));

        let kernels = vec![
            Kernel::new(Box::new(Immediate), config(), Arc::clone(&registry)),
            Kernel::new(Box::new(Immediate), config(), Arc::clone(&registry)),
        ];

        let tasks = supervisor.spawn(kernels);
        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.shutdown(tasks, Duration::from_secs(5)).await;

        let (total, _healthy) = registry.counts();
        assert_eq!(total, 2);
    }
}

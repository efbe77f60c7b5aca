//! Probe kernel: execute -> classify -> record -> reschedule.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mailwarden_health::ProbeRegistry;
use mailwarden_resilience::{classify, next_interval, Breaker, BreakerConfig};
use tokio::sync::broadcast;

use crate::probe::Probe;

/// Tuning shared by every kernel, drawn from the configuration record.
#[derive(Debug, Clone, Copy)]
pub struct KernelConfig {
    /// Probe check timeout bound. Per the probe implementations, this is also
    /// the default upper bound for any network operation a check performs.
    pub base_interval_secs: u64,
    /// Backoff base interval (`BACKOFF_BASE_INTERVAL`): the sleep duration
    /// used when there are no consecutive failures, and the base the
    /// exponential term multiplies from otherwise. Kept distinct from
    /// `base_interval_secs` since an operator may want the scheduling cadence
    /// and the check timeout to diverge.
    pub backoff_base_interval_secs: u64,
    pub breaker: BreakerConfig,
    pub backoff_multiplier: f64,
    pub backoff_max_interval_secs: u64,
    pub backoff_max_failures: u32,
    pub categorization_enabled: bool,
}

/// The per-probe coordinator: owns a breaker, consecutive/total failure
/// counters, and the sleep-then-check loop. One kernel per registered probe.
pub struct Kernel {
    probe: Box<dyn Probe>,
    breaker: Breaker,
    config: KernelConfig,
    registry: Arc<ProbeRegistry>,
}

impl Kernel {
    #[must_use]
    pub fn new(probe: Box<dyn Probe>, config: KernelConfig, registry: Arc<ProbeRegistry>) -> Self {
        registry.register(probe.name());
        Self {
            probe,
            breaker: Breaker::new(config.breaker),
            config,
            registry,
        }
    }

    /// Runs the kernel until `cancel` fires. Never returns an error: every
    /// probe failure is caught, classified, recorded, and logged in place.
    pub async fn run(self, mut cancel: broadcast::Receiver<mailwarden_common::Signal>) {
        let name = self.probe.name();
        let mut consecutive_failures: u32 = 0;
        let mut total_failures: u64 = 0;

        loop {
            let sleep = next_interval(
                consecutive_failures,
                self.config.backoff_base_interval_secs,
                self.config.backoff_multiplier,
                self.config.backoff_max_interval_secs,
                self.config.backoff_max_failures,
            );

            tokio::select! {
                () = tokio::time::sleep(sleep) => {}
                _ = cancel.recv() => {
                    tracing::info!(probe = name, "kernel cancelled, terminating");
                    return;
                }
            }

            let timeout = Duration::from_secs(self.config.base_interval_secs);
            let probe = &self.probe;
            let started = Instant::now();
            let outcome = self.breaker.call(|| probe.check(timeout)).await;
            let elapsed = started.elapsed();

            self.registry.set_healthy(name, self.breaker.is_healthy());

            match outcome {
                Ok(()) => {
                    consecutive_failures = 0;
                    if mailwarden_metrics::is_enabled() {
                        mailwarden_metrics::metrics()
                            .probe
                            .record_outcome(name, true, "none");
                    }
                    tracing::info!(
                        probe = name,
                        duration_ms = elapsed.as_millis() as u64,
                        "probe succeeded"
                    );
                }
                Err(cause) => {
                    let category = classify(&cause, self.config.categorization_enabled);
                    consecutive_failures += 1;
                    total_failures += 1;
                    if mailwarden_metrics::is_enabled() {
                        mailwarden_metrics::metrics().probe.record_outcome(
                            name,
                            false,
                            category.as_str(),
                        );
                    }
                    tracing::warn!(
                        probe = name,
                        duration_ms = elapsed.as_millis() as u64,
                        category = category.as_str(),
                        consecutive_failures,
                        total_failures,
                        "probe failed"
                    );
                }
            }
        }
    }
}

//! Tracks per-probe health and resource-warning state for the `/health` composite.

use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use serde::Serialize;

/// Shared, thread-safe table of probe name to "breaker is not open" status.
///
/// A probe is registered once at supervisor startup and then flipped by its
/// kernel every cycle. Probes default to healthy on registration, matching a
/// circuit breaker's initial `Closed` state.
#[derive(Debug, Default)]
pub struct ProbeRegistry {
    probes: DashMap<String, AtomicBool>,
}

impl ProbeRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a probe by name, defaulting it to healthy.
    pub fn register(&self, probe: &str) {
        self.probes
            .entry(probe.to_string())
            .or_insert_with(|| AtomicBool::new(true));
    }

    /// Updates a probe's health, i.e. whether its breaker is currently not open.
    pub fn set_healthy(&self, probe: &str, healthy: bool) {
        self.probes
            .entry(probe.to_string())
            .or_insert_with(|| AtomicBool::new(true))
            .store(healthy, Ordering::Relaxed);
    }

    /// Returns `(total, healthy)` counts across all registered probes.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let total = self.probes.len();
        let healthy = self
            .probes
            .iter()
            .filter(|entry| entry.value().load(Ordering::Relaxed))
            .count();
        (total, healthy)
    }
}

/// `resources` section of the `/health` response body.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceStatus {
    pub memory_mb: f64,
    pub threads: f64,
    pub warnings: Vec<String>,
}

/// `probes` section of the `/health` response body.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeCounts {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

/// Full `/health` response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub probes: ProbeCounts,
    pub resources: ResourceStatus,
}

impl HealthStatus {
    /// `status` is `"healthy"` iff strictly more than half of probes are
    /// healthy AND no resource warning is active; a single-probe deployment
    /// is healthy iff that one probe is healthy.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        let majority_healthy = self.probes.total > 0
            && self.probes.healthy * 2 > self.probes.total;
        majority_healthy && self.resources.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_defaults_to_healthy() {
        let registry = ProbeRegistry::new();
        registry.register("ip_ping");
        assert_eq!(registry.counts(), (1, 1));
    }

    #[test]
    fn test_registry_tracks_unhealthy() {
        let registry = ProbeRegistry::new();
        registry.register("ip_ping");
        registry.register("http_port");
        registry.set_healthy("http_port", false);
        assert_eq!(registry.counts(), (2, 1));
    }

    fn status(total: usize, healthy: usize, warnings: Vec<String>) -> HealthStatus {
        HealthStatus {
            status: if healthy * 2 > total && warnings.is_empty() && total > 0 {
                "healthy"
            } else {
                "unhealthy"
            },
            probes: ProbeCounts {
                total,
                healthy,
                unhealthy: total - healthy,
            },
            resources: ResourceStatus {
                memory_mb: 0.0,
                threads: 0.0,
                warnings,
            },
        }
    }

    #[test]
    fn test_single_probe_deployment_healthy_iff_that_probe_is_healthy() {
        assert!(status(1, 1, vec![]).is_healthy());
        assert!(!status(1, 0, vec![]).is_healthy());
    }

    #[test]
    fn test_strict_majority_required() {
        // Exactly half healthy is NOT a majority.
        assert!(!status(4, 2, vec![]).is_healthy());
        assert!(status(4, 3, vec![]).is_healthy());
    }

    #[test]
    fn test_resource_warning_forces_unhealthy_even_with_majority() {
        assert!(!status(4, 4, vec!["memory".to_string()]).is_healthy());
    }
}

//! Counter/gauge registry and Prometheus text exposition.
//!
//! Modeled on `empath_metrics`'s global-instance shape (`OnceCell<Metrics>`,
//! `init()`, `metrics()`, `is_enabled()`), but backed by plain atomics and
//! `DashMap` instead of an OTLP `Meter`, since this system exports a flat
//! Prometheus text page rather than pushing to a collector.

pub mod error;
pub mod probe;
pub mod resource;

pub use error::MetricsError;
pub use probe::ProbeMetrics;
pub use resource::ResourceMetrics;

use once_cell::sync::OnceCell;

static METRICS_INSTANCE: OnceCell<Metrics> = OnceCell::new();

/// The full registry: one `ProbeMetrics` and one `ResourceMetrics`.
#[derive(Debug, Default)]
pub struct Metrics {
    pub probe: ProbeMetrics,
    pub resource: ResourceMetrics,
}

impl Metrics {
    #[must_use]
    fn new() -> Self {
        Self::default()
    }

    /// Renders the full registry as Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.probe.render(&mut out);
        self.resource.render(&mut out);
        out
    }
}

/// Initializes the global metrics registry. Must be called exactly once,
/// before `metrics()` is used; typically from `main` during startup.
///
/// # Errors
///
/// Returns [`MetricsError::AlreadyInitialized`] if called more than once.
pub fn init() -> Result<(), MetricsError> {
    METRICS_INSTANCE
        .set(Metrics::new())
        .map_err(|_| MetricsError::AlreadyInitialized)
}

/// Returns the global metrics registry.
///
/// # Panics
///
/// Panics if [`init`] has not yet been called. Every binary entry point
/// calls `init()` before spawning any probe or server task, so in practice
/// this is only reachable from a programming error.
#[must_use]
pub fn metrics() -> &'static Metrics {
    METRICS_INSTANCE
        .get()
        .expect("mailwarden_metrics::init() must run before mailwarden_metrics::metrics()")
}

/// Whether the registry has been initialized.
#[must_use]
pub fn is_enabled() -> bool {
    METRICS_INSTANCE.get().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_render_combines_both_sections() {
        let metrics = Metrics::new();
        metrics.probe.record_outcome("ip_ping", true, "none");
        metrics.resource.set_thread_count(7.0);
        let rendered = metrics.render();
        assert!(rendered.contains("email_probe_success_count"));
        assert!(rendered.contains("email_probe_thread_count 7"));
    }
}

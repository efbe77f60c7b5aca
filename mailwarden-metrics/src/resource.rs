//! Process resource gauges: `email_probe_memory_usage_mb`, `email_probe_thread_count`,
//! and `email_probe_resource_warnings`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// A single `f64` gauge stored as bits in an `AtomicU64`, since `AtomicF64`
/// does not exist in `std`.
#[derive(Debug, Default)]
struct Gauge(AtomicU64);

impl Gauge {
    fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Resident-memory and thread-count gauges, plus one warning gauge per
/// resource kind (`"memory"`, `"threads"`), each either `0` or `1`.
#[derive(Debug, Default)]
pub struct ResourceMetrics {
    memory_usage_mb: Gauge,
    thread_count: Gauge,
    warnings: DashMap<String, Gauge>,
}

impl ResourceMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_memory_usage_mb(&self, value: f64) {
        self.memory_usage_mb.set(value);
    }

    pub fn set_thread_count(&self, value: f64) {
        self.thread_count.set(value);
    }

    #[must_use]
    pub fn memory_usage_mb(&self) -> f64 {
        self.memory_usage_mb.get()
    }

    #[must_use]
    pub fn thread_count(&self) -> f64 {
        self.thread_count.get()
    }

    /// Sets the warning gauge for `warning` (e.g. `"memory"`) to `1.0` if
    /// `active`, else `0.0`.
    pub fn set_warning(&self, warning: &str, active: bool) {
        self.warnings
            .entry(warning.to_string())
            .or_default()
            .set(f64::from(active));
    }

    #[must_use]
    pub fn warning(&self, warning: &str) -> f64 {
        self.warnings.get(warning).map_or(0.0, |g| g.get())
    }

    pub(crate) fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP email_probe_memory_usage_mb Resident memory usage in MB.");
        let _ = writeln!(out, "# TYPE email_probe_memory_usage_mb gauge");
        let _ = writeln!(out, "email_probe_memory_usage_mb {}", self.memory_usage_mb.get());

        let _ = writeln!(out, "# HELP email_probe_thread_count Number of OS threads in use.");
        let _ = writeln!(out, "# TYPE email_probe_thread_count gauge");
        let _ = writeln!(out, "email_probe_thread_count {}", self.thread_count.get());

        let _ = writeln!(out, "# HELP email_probe_resource_warnings Active resource warnings (0 or 1).");
        let _ = writeln!(out, "# TYPE email_probe_resource_warnings gauge");
        for entry in &self.warnings {
            let _ = writeln!(
                out,
                "email_probe_resource_warnings{{warning=\"{}\"}} {}",
                entry.key(),
                entry.value().get()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gauges_roundtrip() {
        let metrics = ResourceMetrics::new();
        metrics.set_memory_usage_mb(123.5);
        metrics.set_thread_count(42.0);
        assert!((metrics.memory_usage_mb() - 123.5).abs() < f64::EPSILON);
        assert!((metrics.thread_count() - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_warning_defaults_to_zero() {
        let metrics = ResourceMetrics::new();
        assert_eq!(metrics.warning("memory"), 0.0);
        metrics.set_warning("memory", true);
        assert_eq!(metrics.warning("memory"), 1.0);
        metrics.set_warning("memory", false);
        assert_eq!(metrics.warning("memory"), 0.0);
    }

    #[test]
    fn test_render_contains_gauges() {
        let metrics = ResourceMetrics::new();
        metrics.set_memory_usage_mb(10.0);
        metrics.set_warning("threads", true);
        let mut out = String::new();
        metrics.render(&mut out);
        assert!(out.contains("email_probe_memory_usage_mb 10"));
        assert!(out.contains("email_probe_resource_warnings{warning=\"threads\"} 1"));
    }
}

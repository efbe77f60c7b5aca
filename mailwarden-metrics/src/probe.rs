//! `email_probe_success_count` — the single counter every probe kernel writes to.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// Label tuple identifying one counter series: `(probe, success, error_type)`.
type Key = (String, bool, String);

/// Outcome counters, one time series per `(probe, success, error_type)` combination.
#[derive(Debug, Default)]
pub struct ProbeMetrics {
    success_count: DashMap<Key, AtomicU64>,
}

impl ProbeMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one probe execution outcome.
    pub fn record_outcome(&self, probe: &str, success: bool, error_type: &str) {
        self.success_count
            .entry((probe.to_string(), success, error_type.to_string()))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the current value of a specific series, for tests and the
    /// `/health` probe-count aggregation.
    #[must_use]
    pub fn get(&self, probe: &str, success: bool, error_type: &str) -> u64 {
        self.success_count
            .get(&(probe.to_string(), success, error_type.to_string()))
            .map_or(0, |entry| entry.load(Ordering::Relaxed))
    }

    pub(crate) fn render(&self, out: &mut String) {
        let _ = writeln!(out, "# HELP email_probe_success_count Outcome count per probe execution.");
        let _ = writeln!(out, "# TYPE email_probe_success_count counter");
        for entry in &self.success_count {
            let (probe, success, error_type) = entry.key();
            let value = entry.value().load(Ordering::Relaxed);
            let _ = writeln!(
                out,
                "email_probe_success_count{{probe=\"{probe}\",success=\"{success}\",error_type=\"{error_type}\"}} {value}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_get() {
        let metrics = ProbeMetrics::new();
        metrics.record_outcome("dns_mx_domain", true, "none");
        metrics.record_outcome("dns_mx_domain", true, "none");
        metrics.record_outcome("dns_mx_domain", false, "dns");

        assert_eq!(metrics.get("dns_mx_domain", true, "none"), 2);
        assert_eq!(metrics.get("dns_mx_domain", false, "dns"), 1);
        assert_eq!(metrics.get("dns_mx_domain", false, "timeout"), 0);
    }

    #[test]
    fn test_render_includes_all_series() {
        let metrics = ProbeMetrics::new();
        metrics.record_outcome("smtp_port", true, "none");
        let mut out = String::new();
        metrics.render(&mut out);
        assert!(out.contains("email_probe_success_count{probe=\"smtp_port\",success=\"true\",error_type=\"none\"} 1"));
    }
}

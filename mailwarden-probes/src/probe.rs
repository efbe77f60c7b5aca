//! The probe capability set: `name()` plus a single fallible `check`.

use async_trait::async_trait;
use mailwarden_resilience::Cause;

/// A single independently scheduled health check.
///
/// Implementors hold whatever state a check needs (target address, shared
/// DNS resolver, credentials) but MUST NOT retain an open connection or
/// socket between calls to `check` — each invocation opens and closes its
/// own network resources.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Stable metric-label name, e.g. `"dns_mx_domain"`.
    fn name(&self) -> &'static str;

    /// Runs the check once. `Ok(())` on success; `Err(cause)` with the raw
    /// cause otherwise. Implementations enforce their own upper time bound,
    /// never exceeding `timeout`.
    async fn check(&self, timeout: std::time::Duration) -> Result<(), Cause>;
}

//! Shared DNS resolution, built directly on `hickory-resolver` with no
//! caching — each probe cycle is already spaced by the base interval, and a
//! stale cached answer would defeat the point of re-checking DNS health.

use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use mailwarden_resilience::Cause;

/// One MX record: exchange hostname and preference (lower = higher priority).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub exchange: String,
    pub preference: u16,
}

fn resolver(timeout: Duration) -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
}

/// Resolves MX records for `domain`, sorted by ascending preference.
///
/// An empty answer is returned as `Ok(vec![])` rather than an error: whether
/// "no MX records" counts as a DNS failure or a failed assertion depends on
/// which probe is asking, so that judgment is left to the caller.
///
/// # Errors
///
/// Returns `Cause::Dns` if the lookup itself fails (NXDOMAIN, SERVFAIL, a
/// timed-out resolver, etc).
pub async fn resolve_mx(domain: &str, timeout: Duration) -> Result<Vec<MxRecord>, Cause> {
    let lookup = resolver(timeout)
        .mx_lookup(domain)
        .await
        .map_err(|err| Cause::Dns(err.to_string()))?;

    let mut records: Vec<MxRecord> = lookup
        .iter()
        .map(|mx| MxRecord {
            exchange: mx.exchange().to_utf8(),
            preference: mx.preference(),
        })
        .collect();

    records.sort_by_key(|r| r.preference);
    Ok(records)
}

/// Resolves A/AAAA records for `host`. As with [`resolve_mx`], an empty
/// answer is `Ok(vec![])`, not an error.
///
/// # Errors
///
/// Returns `Cause::Dns` if the lookup itself fails.
pub async fn resolve_ips(host: &str, timeout: Duration) -> Result<Vec<IpAddr>, Cause> {
    let lookup = resolver(timeout)
        .lookup_ip(host)
        .await
        .map_err(|err| Cause::Dns(err.to_string()))?;

    Ok(lookup.iter().collect())
}

/// Asserts that the configured MX domain has at least one MX record.
pub struct DnsMxDomainProbe {
    domain: String,
}

impl DnsMxDomainProbe {
    #[must_use]
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
        }
    }
}

#[async_trait::async_trait]
impl crate::probe::Probe for DnsMxDomainProbe {
    fn name(&self) -> &'static str {
        "dns_mx_domain"
    }

    async fn check(&self, timeout: Duration) -> Result<(), Cause> {
        let records = resolve_mx(&self.domain, timeout).await?;
        if records.is_empty() {
            return Err(Cause::CheckFailed(format!(
                "no MX records found for {}",
                self.domain
            )));
        }
        Ok(())
    }
}

/// Asserts that every MX target for the configured domain resolves to the
/// expected IP address.
pub struct DnsMxIpProbe {
    domain: String,
    expected_ip: IpAddr,
}

impl DnsMxIpProbe {
    #[must_use]
    pub const fn new(domain: String, expected_ip: IpAddr) -> Self {
        Self {
            domain,
            expected_ip,
        }
    }
}

#[async_trait::async_trait]
impl crate::probe::Probe for DnsMxIpProbe {
    fn name(&self) -> &'static str {
        "dns_mx_ip"
    }

    async fn check(&self, timeout: Duration) -> Result<(), Cause> {
        let mx_records = resolve_mx(&self.domain, timeout).await?;
        if mx_records.is_empty() {
            return Err(Cause::Dns(format!("no MX records for {}", self.domain)));
        }

        let mut resolved = 0usize;
        let mut all_match = true;

        for record in &mx_records {
            match resolve_ips(&record.exchange, timeout).await {
                Ok(ips) if !ips.is_empty() => {
                    resolved += 1;
                    if !ips.contains(&self.expected_ip) {
                        all_match = false;
                    }
                }
                _ => all_match = false,
            }
        }

        if resolved == 0 {
            Err(Cause::Dns(format!(
                "none of the MX targets for {} resolved to an A/AAAA record",
                self.domain
            )))
        } else if !all_match {
            Err(Cause::CheckFailed(format!(
                "not every MX target for {} resolved to the expected IP {}",
                self.domain, self.expected_ip
            )))
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_resolve_mx_for_a_real_domain() {
        let records = resolve_mx("gmail.com", Duration::from_secs(5)).await.unwrap();
        assert!(!records.is_empty());
        assert!(records.windows(2).all(|w| w[0].preference <= w[1].preference));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_dns_mx_domain_probe_succeeds_for_a_real_domain() {
        use crate::probe::Probe;
        let probe = DnsMxDomainProbe::new("gmail.com");
        probe.check(Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_dns_mx_domain_probe_fails_for_nxdomain() {
        use crate::probe::Probe;
        let probe = DnsMxDomainProbe::new("this-domain-should-not-exist-mailwarden.invalid");
        let err = probe.check(Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, Cause::Dns(_)));
    }
}

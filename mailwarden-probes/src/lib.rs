//! Probe kernel, supervisor, resource watcher, and the concrete health checks
//! that together implement the probe scheduler and resilience envelope.

pub mod dns;
pub mod kernel;
pub mod network;
pub mod ping;
pub mod probe;
pub mod resource;
pub mod smtp;
pub mod supervisor;
pub mod tls;

pub use kernel::{Kernel, KernelConfig};
pub use probe::Probe;
pub use resource::{ResourceWatcher, ResourceWatcherConfig};
pub use supervisor::Supervisor;

use std::net::SocketAddr;

use mailwarden_common::Config;

use dns::{DnsMxDomainProbe, DnsMxIpProbe};
use network::TcpPortProbe;
use ping::IcmpProbe;
use smtp::{SmtpAuthenticatedProbe, SmtpCertificateProbe, SmtpUnauthenticatedProbe};
use tls::HttpsCertificateProbe;

/// Builds the full set of eleven registered probes from a validated
/// configuration: `dns_mx_domain`, `dns_mx_ip`, `ip_ping`, the four TCP port
/// checks, `https_certificate`, `smtp_certificate`, `smtp_authenticated`, and
/// `smtp_unauthenticated`.
///
/// `smtp_certificate` and `smtp_authenticated` target the submission port,
/// where `STARTTLS` is mandatory; `smtp_unauthenticated` targets the plain
/// SMTP port, where `STARTTLS` is tolerated but not required.
#[must_use]
pub fn build_all(config: &Config) -> Vec<Box<dyn Probe>> {
    let http_addr = SocketAddr::new(config.server_ip, config.http_port);
    let https_addr = SocketAddr::new(config.server_ip, config.https_port);
    let smtp_addr = SocketAddr::new(config.server_ip, config.smtp_port);
    let submission_addr = SocketAddr::new(config.server_ip, config.smtp_submission_port);

    vec![
        Box::new(DnsMxDomainProbe::new(config.mx_domain.to_string())),
        Box::new(DnsMxIpProbe::new(
            config.mx_domain.to_string(),
            config.expected_ip,
        )),
        Box::new(IcmpProbe::new(config.server_ip)),
        Box::new(TcpPortProbe::new("http_port", http_addr)),
        Box::new(TcpPortProbe::new("https_port", https_addr)),
        Box::new(TcpPortProbe::new("mail_port", smtp_addr)),
        Box::new(TcpPortProbe::new("smtp_port", submission_addr)),
        Box::new(HttpsCertificateProbe::new(
            config.server_ip,
            config.https_port,
            config.server_hostname.to_string(),
        )),
        Box::new(SmtpCertificateProbe::new(
            submission_addr,
            config.server_hostname.to_string(),
            true,
        )),
        Box::new(SmtpAuthenticatedProbe::new(
            submission_addr,
            config.server_hostname.to_string(),
            config.smtp_username.clone(),
            config.smtp_password.clone(),
        )),
        Box::new(SmtpUnauthenticatedProbe::new(
            smtp_addr,
            config.server_hostname.to_string(),
            config.from_address.clone(),
            config.to_address.clone(),
        )),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailwarden_common::Domain;
    use std::net::IpAddr;

    fn config() -> Config {
        Config {
            server_ip: "192.0.2.10".parse::<IpAddr>().unwrap(),
            server_hostname: Domain::new("mail.example.com"),
            mx_domain: Domain::new("example.com"),
            expected_ip: "192.0.2.10".parse::<IpAddr>().unwrap(),
            http_port: 80,
            https_port: 443,
            smtp_port: 25,
            smtp_submission_port: 587,
            smtp_username: "probe".to_string(),
            smtp_password: "secret".to_string(),
            from_address: "probe@example.com".to_string(),
            to_address: "postmaster@example.com".to_string(),
            probe_collection_interval_secs: 30,
            metrics_export_port: 9090,
            breaker_failure_threshold: 5,
            breaker_recovery_timeout_secs: 60,
            backoff_base_interval_secs: 30,
            backoff_max_interval_secs: 300,
            backoff_multiplier: 2.0,
            backoff_max_failures: 5,
            enable_error_categorization: true,
            enable_enhanced_logging: false,
            resource_memory_warning_mb: 512,
            resource_thread_warning_count: 100,
            resource_check_enabled: true,
        }
    }

    #[test]
    fn test_build_all_registers_eleven_probes_with_unique_names() {
        let probes = build_all(&config());
        assert_eq!(probes.len(), 11);
        let mut names: Vec<&str> = probes.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 11, "every probe name must be unique");
    }
}

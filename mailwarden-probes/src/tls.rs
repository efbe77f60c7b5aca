//! Shared TLS handshake verification for `https_certificate` and
//! `smtp_certificate`: validate the chain against the system trust store and
//! the hostname, in strict mode — a mismatched hostname fails even when the
//! chain itself validates.
//!
//! Older deployments walk TLS 1.2, 1.1, and 1.0 in that order looking for a
//! version the peer accepts. `rustls` implements only 1.3 and 1.2 and
//! deliberately has no path to re-add the older, deprecated versions, so this
//! probe walks the versions it can actually offer (1.3 then 1.2).

use std::sync::Arc;
use std::time::Duration;

use mailwarden_resilience::Cause;
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use tokio_rustls::TlsConnector;

pub(crate) const VERSION_PREFERENCE: &[&SupportedProtocolVersion] = &[
    &tokio_rustls::rustls::version::TLS13,
    &tokio_rustls::rustls::version::TLS12,
];

pub(crate) fn root_store() -> Result<RootCertStore, Cause> {
    let mut store = RootCertStore::empty();
    let loaded = rustls_native_certs::load_native_certs();
    for cert in loaded.certs {
        store
            .add(cert)
            .map_err(|e| Cause::Cert(format!("failed to load native certificate: {e}")))?;
    }
    if !loaded.errors.is_empty() {
        tracing::warn!(errors = ?loaded.errors, "some system certificates could not be loaded");
    }
    Ok(store)
}

/// Connects to `addr` and performs a TLS handshake verified against
/// `hostname`, trying each entry of [`VERSION_PREFERENCE`] until one
/// succeeds. Fails with `Cause::Cert` if every version is rejected, and
/// with `Cause::Network`/`Cause::Timeout` if the underlying TCP connect
/// fails or exceeds `timeout`.
pub async fn verify_certificate(addr: &str, hostname: &str, timeout: Duration) -> Result<(), Cause> {
    let mut last_err: Option<Cause> = None;

    for version in VERSION_PREFERENCE {
        match try_handshake(addr, hostname, timeout, std::slice::from_ref(version)).await {
            Ok(()) => return Ok(()),
            Err(cause) => last_err = Some(cause),
        }
    }

    Err(last_err.unwrap_or_else(|| Cause::Cert("no TLS version succeeded".to_string())))
}

async fn try_handshake(
    addr: &str,
    hostname: &str,
    timeout: Duration,
    versions: &[&'static SupportedProtocolVersion],
) -> Result<(), Cause> {
    let connect = async {
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|e| Cause::Network(e.to_string()))?;

        let store = root_store()?;
        let config = ClientConfig::builder_with_protocol_versions(versions)
            .with_root_certificates(store)
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|e| Cause::Cert(format!("invalid hostname {hostname}: {e}")))?;

        connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| Cause::Cert(e.to_string()))?;

        Ok(())
    };

    tokio::time::timeout(timeout, connect)
        .await
        .unwrap_or(Err(Cause::Timeout))
}

/// Validates the HTTPS certificate at (`server_hostname`, `https_port`).
pub struct HttpsCertificateProbe {
    addr: String,
    hostname: String,
}

impl HttpsCertificateProbe {
    #[must_use]
    pub fn new(server_ip: std::net::IpAddr, https_port: u16, hostname: impl Into<String>) -> Self {
        Self {
            addr: format!("{server_ip}:{https_port}"),
            hostname: hostname.into(),
        }
    }
}

#[async_trait::async_trait]
impl crate::probe::Probe for HttpsCertificateProbe {
    fn name(&self) -> &'static str {
        "https_certificate"
    }

    async fn check(&self, timeout: Duration) -> Result<(), Cause> {
        verify_certificate(&self.addr, &self.hostname, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_verify_certificate_against_a_real_host() {
        verify_certificate("example.com:443", "example.com", Duration::from_secs(10))
            .await
            .expect("example.com should present a valid certificate");
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_verify_certificate_rejects_hostname_mismatch() {
        let err = verify_certificate("example.com:443", "not-example.invalid", Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(err, Cause::Cert(_)));
    }

    #[tokio::test]
    async fn test_verify_certificate_fails_fast_on_connection_refused() {
        // Port 1 is reserved and nothing should be listening on loopback.
        let err = verify_certificate("127.0.0.1:1", "localhost", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Cause::Network(_) | Cause::Timeout));
    }
}

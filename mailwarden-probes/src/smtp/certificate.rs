//! `smtp_certificate`: validates the SMTP server's TLS certificate.
//!
//! The submission port (587) only ever speaks plaintext until `STARTTLS` is
//! issued, so validating it means completing a plain SMTP handshake first.
//! Every other configured port is assumed to speak implicit TLS from the
//! first byte. Both paths apply the same chain/hostname/version policy as
//! `https_certificate`.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use mailwarden_resilience::Cause;
use tokio_rustls::rustls::SupportedProtocolVersion;

use crate::probe::Probe;
use crate::tls::{verify_certificate, VERSION_PREFERENCE};

use super::client::SmtpClient;

pub struct SmtpCertificateProbe {
    addr: SocketAddr,
    hostname: String,
    starttls_first: bool,
}

impl SmtpCertificateProbe {
    /// `starttls_first` should be `true` iff `addr`'s port is the submission
    /// port: submission speaks `STARTTLS`, every other configured port is
    /// assumed to speak implicit TLS from the first byte.
    #[must_use]
    pub fn new(addr: SocketAddr, hostname: impl Into<String>, starttls_first: bool) -> Self {
        Self {
            addr,
            hostname: hostname.into(),
            starttls_first,
        }
    }
}

#[async_trait]
impl Probe for SmtpCertificateProbe {
    fn name(&self) -> &'static str {
        "smtp_certificate"
    }

    async fn check(&self, timeout: Duration) -> Result<(), Cause> {
        if self.starttls_first {
            verify_via_starttls(self.addr, &self.hostname, timeout).await
        } else {
            verify_certificate(&self.addr.to_string(), &self.hostname, timeout).await
        }
    }
}

/// Validates the certificate offered after a `STARTTLS` upgrade, trying each
/// entry of [`VERSION_PREFERENCE`] with a fresh connection (a failed
/// handshake leaves the underlying session unusable for a second attempt).
async fn verify_via_starttls(addr: SocketAddr, hostname: &str, timeout: Duration) -> Result<(), Cause> {
    let mut last_err: Option<Cause> = None;

    for version in VERSION_PREFERENCE {
        match try_starttls_handshake(addr, hostname, timeout, std::slice::from_ref(version)).await {
            Ok(()) => return Ok(()),
            Err(cause) => last_err = Some(cause),
        }
    }

    Err(last_err.unwrap_or_else(|| Cause::Cert("no TLS version succeeded".to_string())))
}

async fn try_starttls_handshake(
    addr: SocketAddr,
    hostname: &str,
    timeout: Duration,
    versions: &[&'static SupportedProtocolVersion],
) -> Result<(), Cause> {
    let attempt = async {
        let mut client = SmtpClient::connect(&addr.to_string(), hostname, timeout).await?;
        client.read_greeting().await?;

        let ehlo = client.ehlo(hostname).await?;
        if !ehlo.is_success() {
            return Err(Cause::Network(format!("EHLO rejected: {}", ehlo.code)));
        }
        if !ehlo.advertises_extension("STARTTLS") {
            return Err(Cause::Cert(
                "server did not advertise STARTTLS on the submission port".to_string(),
            ));
        }

        let tls_response = client.starttls_with_versions(versions).await?;
        if !tls_response.is_success() {
            return Err(Cause::Cert(format!(
                "server refused STARTTLS: {}",
                tls_response.code
            )));
        }

        Ok(())
    };

    tokio::time::timeout(timeout, attempt)
        .await
        .unwrap_or(Err(Cause::Timeout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_starttls_verification_fails_when_nothing_listens() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let err = verify_via_starttls(addr, "localhost", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, Cause::Network(_) | Cause::Timeout));
    }
}

//! `smtp_authenticated` and `smtp_unauthenticated`: full SMTP conversations
//! that exercise credential and envelope handling respectively.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use mailwarden_resilience::Cause;

use crate::probe::Probe;

use super::client::SmtpClient;
use super::response::Response;

/// Connects to the submission port, upgrades via `STARTTLS`, authenticates
/// with the configured credentials, then quits. Every step must succeed.
pub struct SmtpAuthenticatedProbe {
    addr: SocketAddr,
    hostname: String,
    username: String,
    password: String,
}

impl SmtpAuthenticatedProbe {
    #[must_use]
    pub fn new(addr: SocketAddr, hostname: impl Into<String>, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            addr,
            hostname: hostname.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

#[async_trait]
impl Probe for SmtpAuthenticatedProbe {
    fn name(&self) -> &'static str {
        "smtp_authenticated"
    }

    async fn check(&self, timeout: Duration) -> Result<(), Cause> {
        let attempt = async {
            let mut client = SmtpClient::connect(&self.addr.to_string(), &self.hostname, timeout).await?;
            client.read_greeting().await?;

            let ehlo = client.ehlo(&self.hostname).await?;
            require_success(&ehlo, "EHLO")?;

            if !ehlo.advertises_extension("STARTTLS") {
                return Err(Cause::Cert(
                    "server did not advertise STARTTLS on the submission port".to_string(),
                ));
            }

            let tls_response = client.starttls().await?;
            if !tls_response.is_success() {
                return Err(Cause::Cert(format!(
                    "server advertised STARTTLS but refused the upgrade: {}",
                    tls_response.code
                )));
            }

            let ehlo_after_tls = client.ehlo(&self.hostname).await?;
            require_success(&ehlo_after_tls, "EHLO after STARTTLS")?;

            let auth = client.auth_login(&self.username, &self.password).await?;
            if auth.is_permanent_error() {
                return Err(Cause::Auth(format!(
                    "authentication rejected: {}",
                    auth.code
                )));
            }
            if !auth.is_success() {
                return Err(Cause::Auth(format!(
                    "unexpected AUTH LOGIN response: {}",
                    auth.code
                )));
            }

            let _ = client.quit().await;
            Ok(())
        };

        tokio::time::timeout(timeout, attempt)
            .await
            .unwrap_or(Err(Cause::Timeout))
    }
}

/// Connects to the plain SMTP port, optionally upgrades via `STARTTLS` (not
/// required there), and submits a test envelope, expecting it to be
/// accepted without ever actually queuing a message for delivery.
pub struct SmtpUnauthenticatedProbe {
    addr: SocketAddr,
    hostname: String,
    from_address: String,
    to_address: String,
}

impl SmtpUnauthenticatedProbe {
    #[must_use]
    pub fn new(addr: SocketAddr, hostname: impl Into<String>, from_address: impl Into<String>, to_address: impl Into<String>) -> Self {
        Self {
            addr,
            hostname: hostname.into(),
            from_address: from_address.into(),
            to_address: to_address.into(),
        }
    }
}

#[async_trait]
impl Probe for SmtpUnauthenticatedProbe {
    fn name(&self) -> &'static str {
        "smtp_unauthenticated"
    }

    async fn check(&self, timeout: Duration) -> Result<(), Cause> {
        let attempt = async {
            let mut client = SmtpClient::connect(&self.addr.to_string(), &self.hostname, timeout).await?;
            client.read_greeting().await?;

            let ehlo = client.ehlo(&self.hostname).await?;
            require_success(&ehlo, "EHLO")?;

            if ehlo.advertises_extension("STARTTLS") {
                // Tolerated but not required on the plain SMTP port: a refusal
                // here does not fail the probe.
                if let Err(err) = client.starttls().await {
                    tracing::debug!(cause = %err, "STARTTLS offered but upgrade failed on plain SMTP port, continuing");
                }
            }

            let mail_from = client.mail_from(&self.from_address).await?;
            envelope_response("MAIL FROM", &mail_from)?;

            let rcpt_to = client.rcpt_to(&self.to_address).await?;
            envelope_response("RCPT TO", &rcpt_to)?;

            let _ = client.rset().await;
            let _ = client.quit().await;
            Ok(())
        };

        tokio::time::timeout(timeout, attempt)
            .await
            .unwrap_or(Err(Cause::Timeout))
    }
}

fn require_success(response: &Response, step: &str) -> Result<(), Cause> {
    if response.is_success() {
        Ok(())
    } else {
        Err(Cause::Network(format!(
            "{step} rejected: {}",
            response.code
        )))
    }
}

/// MAIL FROM / RCPT TO are classified per spec: 5xx is a failed assertion
/// about the server's envelope handling, 4xx is treated as transient/network.
fn envelope_response(step: &str, response: &Response) -> Result<(), Cause> {
    if response.is_permanent_error() {
        Err(Cause::CheckFailed(format!(
            "{step} rejected: {}",
            response.code
        )))
    } else if response.is_temporary_error() {
        Err(Cause::Network(format!(
            "{step} temporarily rejected: {}",
            response.code
        )))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unauthenticated_probe_fails_fast_when_nothing_listens() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let probe = SmtpUnauthenticatedProbe::new(addr, "localhost", "probe@example.com", "postmaster@example.com");
        let err = probe.check(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, Cause::Network(_) | Cause::Timeout));
    }

    #[tokio::test]
    async fn test_authenticated_probe_fails_fast_when_nothing_listens() {
        let addr: SocketAddr = "127.0.0.1:1".parse().unwrap();
        let probe = SmtpAuthenticatedProbe::new(addr, "localhost", "probe", "secret");
        let err = probe.check(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, Cause::Network(_) | Cause::Timeout));
    }

    #[test]
    fn test_envelope_response_classification() {
        let rejected = Response {
            code: 550,
            lines: vec!["mailbox unavailable".into()],
        };
        assert!(matches!(
            envelope_response("RCPT TO", &rejected),
            Err(Cause::CheckFailed(_))
        ));

        let deferred = Response {
            code: 450,
            lines: vec!["mailbox busy".into()],
        };
        assert!(matches!(
            envelope_response("RCPT TO", &deferred),
            Err(Cause::Network(_))
        ));

        let accepted = Response {
            code: 250,
            lines: vec!["OK".into()],
        };
        assert!(envelope_response("RCPT TO", &accepted).is_ok());
    }
}

//! A minimal SMTP client: connect, read the greeting, issue commands, and
//! optionally upgrade to TLS via STARTTLS. Each probe owns exactly one
//! client for the lifetime of its check and drops it at the end.

use std::sync::Arc;
use std::time::Duration;

use mailwarden_common::{incoming, outgoing};
use mailwarden_resilience::Cause;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, SupportedProtocolVersion};
use tokio_rustls::TlsConnector;

use crate::tls::{root_store, VERSION_PREFERENCE};

use super::response::Response;

const INITIAL_BUFFER_SIZE: usize = 8192;
const MAX_BUFFER_SIZE: usize = 1024 * 1024;

enum Connection {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

impl Connection {
    async fn write_all(&mut self, data: &[u8]) -> Result<(), Cause> {
        let result = match self {
            Self::Plain(stream) => stream.write_all(data).await,
            Self::Tls(stream) => stream.write_all(data).await,
        };
        result.map_err(|e| Cause::Network(e.to_string()))
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Cause> {
        let n = match self {
            Self::Plain(stream) => stream.read(buf).await,
            Self::Tls(stream) => stream.read(buf).await,
        }
        .map_err(|e| Cause::Network(e.to_string()))?;

        if n == 0 {
            return Err(Cause::Network("connection closed by peer".to_string()));
        }
        Ok(n)
    }

    async fn upgrade_to_tls(
        self,
        hostname: &str,
        versions: &[&'static SupportedProtocolVersion],
    ) -> Result<Self, Cause> {
        let Self::Plain(stream) = self else {
            return Err(Cause::Cert("connection is already TLS".to_string()));
        };

        let store = root_store()?;
        let config = ClientConfig::builder_with_protocol_versions(versions)
            .with_root_certificates(store)
            .with_no_client_auth();

        let connector = TlsConnector::from(Arc::new(config));
        let server_name = ServerName::try_from(hostname.to_string())
            .map_err(|e| Cause::Cert(format!("invalid hostname {hostname}: {e}")))?;

        let tls_stream = connector
            .connect(server_name, stream)
            .await
            .map_err(|e| Cause::Cert(e.to_string()))?;

        Ok(Self::Tls(Box::new(tls_stream)))
    }
}

/// A short-lived SMTP client connection.
pub struct SmtpClient {
    connection: Option<Connection>,
    buffer: Vec<u8>,
    buffer_len: usize,
    server_hostname: String,
    deadline: Duration,
}

impl SmtpClient {
    /// Connects to `addr` within `deadline`.
    ///
    /// # Errors
    ///
    /// Returns `Cause::Timeout` if the connect exceeds `deadline`, or
    /// `Cause::Network` on any other connect failure.
    pub async fn connect(addr: &str, server_hostname: &str, deadline: Duration) -> Result<Self, Cause> {
        let stream = tokio::time::timeout(deadline, TcpStream::connect(addr))
            .await
            .map_err(|_| Cause::Timeout)?
            .map_err(|e| Cause::Network(e.to_string()))?;

        Ok(Self {
            connection: Some(Connection::Plain(stream)),
            buffer: vec![0u8; INITIAL_BUFFER_SIZE],
            buffer_len: 0,
            server_hostname: server_hostname.to_string(),
            deadline,
        })
    }

    fn connection_mut(&mut self) -> Result<&mut Connection, Cause> {
        self.connection
            .as_mut()
            .ok_or_else(|| Cause::Network("connection closed".to_string()))
    }

    /// Reads the server's initial greeting.
    pub async fn read_greeting(&mut self) -> Result<Response, Cause> {
        self.read_response().await
    }

    async fn send_command(&mut self, command: &str) -> Result<(), Cause> {
        outgoing!("{command}");

        let line = format!("{command}\r\n");
        let deadline = self.deadline;
        let connection = self.connection_mut()?;
        tokio::time::timeout(deadline, connection.write_all(line.as_bytes()))
            .await
            .map_err(|_| Cause::Timeout)??;
        Ok(())
    }

    async fn command(&mut self, command: &str) -> Result<Response, Cause> {
        self.send_command(command).await?;
        self.read_response().await
    }

    /// As [`Self::command`], but logs `redacted_as` on the wire instead of
    /// `command`, so the base64-encoded credentials sent by
    /// [`Self::auth_login`] never reach the trace log.
    async fn command_redacted(&mut self, command: &str, redacted_as: &str) -> Result<Response, Cause> {
        outgoing!("{redacted_as}");

        let line = format!("{command}\r\n");
        let deadline = self.deadline;
        let connection = self.connection_mut()?;
        tokio::time::timeout(deadline, connection.write_all(line.as_bytes()))
            .await
            .map_err(|_| Cause::Timeout)??;

        self.read_response().await
    }

    pub async fn ehlo(&mut self, domain: &str) -> Result<Response, Cause> {
        self.command(&format!("EHLO {domain}")).await
    }

    pub async fn mail_from(&mut self, from: &str) -> Result<Response, Cause> {
        self.command(&format!("MAIL FROM:<{from}>")).await
    }

    pub async fn rcpt_to(&mut self, to: &str) -> Result<Response, Cause> {
        self.command(&format!("RCPT TO:<{to}>")).await
    }

    pub async fn rset(&mut self) -> Result<Response, Cause> {
        self.command("RSET").await
    }

    pub async fn quit(&mut self) -> Result<Response, Cause> {
        self.command("QUIT").await
    }

    /// Sends `AUTH LOGIN` followed by base64-encoded username and password.
    pub async fn auth_login(&mut self, username: &str, password: &str) -> Result<Response, Cause> {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine as _;

        let response = self.command("AUTH LOGIN").await?;
        if !response.is_success() && response.code != 334 {
            return Ok(response);
        }

        let user_response = self
            .command_redacted(&STANDARD.encode(username), "<base64 username>")
            .await?;
        if user_response.code != 334 {
            return Ok(user_response);
        }

        self.command_redacted(&STANDARD.encode(password), "<base64 password>").await
    }

    /// Sends `STARTTLS` and, on success, upgrades the connection in place,
    /// negotiating any version the system's default TLS stack offers.
    ///
    /// # Errors
    ///
    /// Returns `Cause::Cert` if the TLS handshake itself fails.
    pub async fn starttls(&mut self) -> Result<Response, Cause> {
        self.starttls_with_versions(VERSION_PREFERENCE).await
    }

    /// As [`Self::starttls`], but constrains the upgrade to exactly the given
    /// protocol versions — used by the certificate probe's version-fallback
    /// loop, where each attempt must negotiate one specific version.
    ///
    /// # Errors
    ///
    /// Returns `Cause::Cert` if the TLS handshake itself fails.
    pub async fn starttls_with_versions(
        &mut self,
        versions: &[&'static SupportedProtocolVersion],
    ) -> Result<Response, Cause> {
        let response = self.command("STARTTLS").await?;
        if response.is_success() {
            let plain = self
                .connection
                .take()
                .ok_or_else(|| Cause::Network("connection closed".to_string()))?;
            self.connection = Some(plain.upgrade_to_tls(&self.server_hostname, versions).await?);
        }
        Ok(response)
    }

    async fn read_response(&mut self) -> Result<Response, Cause> {
        loop {
            if let Some((response, consumed)) =
                Response::parse_response(&self.buffer[..self.buffer_len])?
            {
                self.buffer.copy_within(consumed..self.buffer_len, 0);
                self.buffer_len -= consumed;
                incoming!("{} {}", response.code, response.lines.join(" "));
                return Ok(response);
            }

            if self.buffer_len >= self.buffer.len() {
                let new_size = self.buffer.len() * 2;
                if new_size > MAX_BUFFER_SIZE {
                    return Err(Cause::Network("SMTP response exceeded maximum size".to_string()));
                }
                self.buffer.resize(new_size, 0);
            }

            let buffer_len = self.buffer_len;
            let deadline = self.deadline;
            let connection = self.connection_mut()?;
            let n = tokio::time::timeout(deadline, connection.read(&mut self.buffer[buffer_len..]))
                .await
                .unwrap_or(Err(Cause::Timeout))?;
            self.buffer_len += n;
        }
    }
}

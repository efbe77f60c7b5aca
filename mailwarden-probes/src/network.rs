//! TCP reachability probes: `http_port`, `https_port`, `mail_port`, `smtp_port`.
//!
//! All four are the same check against a different configured port: open a
//! TCP connection within the time bound and immediately drop it. None of
//! these probes speaks the protocol on the other end — that is left to the
//! certificate and SMTP-conversation probes.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use mailwarden_resilience::Cause;
use tokio::net::TcpStream;

use crate::probe::Probe;

/// A bare TCP connect-and-close check against a fixed address.
pub struct TcpPortProbe {
    name: &'static str,
    addr: SocketAddr,
}

impl TcpPortProbe {
    #[must_use]
    pub const fn new(name: &'static str, addr: SocketAddr) -> Self {
        Self { name, addr }
    }
}

#[async_trait]
impl Probe for TcpPortProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn check(&self, timeout: Duration) -> Result<(), Cause> {
        match tokio::time::timeout(timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(err)) => Err(classify_connect_error(&err)),
            Err(_) => Err(Cause::Timeout),
        }
    }
}

fn classify_connect_error(err: &std::io::Error) -> Cause {
    match err.kind() {
        std::io::ErrorKind::TimedOut => Cause::Timeout,
        _ => Cause::Network(err.to_string()),
    }
}

//! `ip_ping`: a single ICMP echo via the host OS's `ping` binary.
//!
//! This process does not hold `CAP_NET_RAW`, so a raw ICMP socket is not an
//! option; shelling out to the platform tool is the portable capability the
//! spec asks for. `icmp_once` is kept separate from the [`Probe`] impl so an
//! alternate implementation (a raw-socket ping where permitted) can be
//! swapped in later without touching the kernel or supervisor.

use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use mailwarden_resilience::Cause;
use tokio::process::Command;

use crate::probe::Probe;

/// Issues one ICMP echo to `host`, succeeding iff the `ping` tool exits 0
/// before `timeout` elapses.
///
/// # Errors
///
/// `Cause::Timeout` if the command does not finish in time; `Cause::Network`
/// if the tool can't be spawned or exits non-zero.
pub async fn icmp_once(host: &str, timeout: Duration) -> Result<(), Cause> {
    let mut command = platform_command(host);
    command.stdout(Stdio::null()).stderr(Stdio::null());

    let child = command
        .spawn()
        .map_err(|e| Cause::Network(format!("failed to spawn ping: {e}")))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| Cause::Timeout)?
        .map_err(|e| Cause::Network(e.to_string()))?;

    if output.status.success() {
        Ok(())
    } else {
        Err(Cause::Network(format!(
            "ping exited with status {}",
            output.status
        )))
    }
}

#[cfg(unix)]
fn platform_command(host: &str) -> Command {
    let mut cmd = Command::new("ping");
    cmd.args(["-c", "1", host]);
    cmd
}

#[cfg(windows)]
fn platform_command(host: &str) -> Command {
    let mut cmd = Command::new("ping");
    cmd.args(["-n", "1", host]);
    cmd
}

pub struct IcmpProbe {
    host: IpAddr,
}

impl IcmpProbe {
    #[must_use]
    pub const fn new(host: IpAddr) -> Self {
        Self { host }
    }
}

#[async_trait]
impl Probe for IcmpProbe {
    fn name(&self) -> &'static str {
        "ip_ping"
    }

    async fn check(&self, timeout: Duration) -> Result<(), Cause> {
        icmp_once(&self.host.to_string(), timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires ping(1) and network access"]
    async fn test_ping_loopback_succeeds() {
        icmp_once("127.0.0.1", Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test]
    async fn test_ping_nonexistent_binary_reports_network_cause() {
        let mut command = Command::new("definitely-not-a-real-ping-binary");
        command.stdout(Stdio::null()).stderr(Stdio::null());
        let err = command.spawn().map_err(|e| Cause::Network(e.to_string())).unwrap_err();
        assert!(matches!(err, Cause::Network(_)));
    }
}

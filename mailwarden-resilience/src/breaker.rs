//! Per-probe circuit breaker.
//!
//! Unlike a delivery system's breaker, which is keyed per destination domain,
//! a probe's breaker guards exactly one target: the kernel that owns it. One
//! [`Breaker`] is created per probe and never shared.

use std::future::Future;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::classify::Cause;

/// Tunable thresholds for a breaker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures, while closed, required to trip the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before a probe call is allowed through.
    pub recovery_timeout_secs: u64,
}

impl BreakerConfig {
    #[must_use]
    pub const fn new(failure_threshold: u32, recovery_timeout_secs: u64) -> Self {
        Self {
            failure_threshold,
            recovery_timeout_secs,
        }
    }
}

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Normal operation: calls are allowed through.
    Closed,
    /// Tripped: calls are rejected without running the check.
    Open,
    /// Testing recovery: the next call is allowed through as a probe.
    HalfOpen,
}

struct Inner {
    state: State,
    failure_count: u32,
    opened_at: Option<Instant>,
    config: BreakerConfig,
}

impl Inner {
    const fn new(config: BreakerConfig) -> Self {
        Self {
            state: State::Closed,
            failure_count: 0,
            opened_at: None,
            config,
        }
    }

    fn is_timeout_expired(&self) -> bool {
        self.opened_at.is_some_and(|opened_at| {
            opened_at.elapsed() >= Duration::from_secs(self.config.recovery_timeout_secs)
        })
    }

    /// Returns `true` if a call should be let through right now. May transition
    /// `Open -> HalfOpen` as a side effect once the recovery timeout has elapsed.
    fn admit(&mut self) -> bool {
        match self.state {
            State::Open => {
                if self.is_timeout_expired() {
                    self.state = State::HalfOpen;
                    info!("circuit breaker entering half-open state");
                    true
                } else {
                    false
                }
            }
            State::Closed | State::HalfOpen => true,
        }
    }

    fn record_success(&mut self) {
        match self.state {
            State::Closed => {
                self.failure_count = 0;
            }
            State::HalfOpen => {
                self.state = State::Closed;
                self.failure_count = 0;
                self.opened_at = None;
                info!("circuit breaker closed after successful recovery probe");
            }
            State::Open => {
                warn!("circuit breaker received a success while open");
            }
        }
    }

    fn record_failure(&mut self) {
        match self.state {
            State::Closed => {
                self.failure_count += 1;
                if self.failure_count >= self.config.failure_threshold {
                    self.state = State::Open;
                    self.opened_at = Some(Instant::now());
                    warn!(
                        failure_count = self.failure_count,
                        threshold = self.config.failure_threshold,
                        "circuit breaker opened"
                    );
                }
            }
            State::HalfOpen => {
                self.state = State::Open;
                self.opened_at = Some(Instant::now());
                warn!("circuit breaker recovery probe failed, reopening");
            }
            State::Open => {}
        }
    }
}

/// A breaker owned by exactly one probe kernel.
pub struct Breaker {
    inner: Mutex<Inner>,
}

impl Breaker {
    #[must_use]
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner::new(config)),
        }
    }

    /// Returns the current state without mutating it. Cheap: a single lock
    /// acquisition and no I/O.
    #[must_use]
    pub fn state(&self) -> State {
        self.inner.lock().state
    }

    /// Returns `true` iff the breaker is not open — the per-probe contribution
    /// to the composite `/health` verdict.
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.state() != State::Open
    }

    /// Runs `thunk` if the breaker admits the call, otherwise fails fast with
    /// [`Cause::BreakerOpen`] without invoking `thunk`.
    pub async fn call<F, Fut, T>(&self, thunk: F) -> Result<T, Cause>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Cause>>,
    {
        let admitted = self.inner.lock().admit();
        if !admitted {
            return Err(Cause::BreakerOpen);
        }

        let result = thunk().await;

        let mut inner = self.inner.lock();
        match &result {
            Ok(_) => inner.record_success(),
            Err(_) => inner.record_failure(),
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery_secs: u64) -> Breaker {
        Breaker::new(BreakerConfig::new(threshold, recovery_secs))
    }

    async fn ok() -> Result<(), Cause> {
        Ok(())
    }

    async fn fail() -> Result<(), Cause> {
        Err(Cause::Network("refused".into()))
    }

    #[tokio::test]
    async fn test_trips_after_threshold_consecutive_failures() {
        let b = breaker(3, 60);
        assert_eq!(b.state(), State::Closed);

        b.call(fail).await.ok();
        assert_eq!(b.state(), State::Closed);
        b.call(fail).await.ok();
        assert_eq!(b.state(), State::Closed);
        b.call(fail).await.ok();
        assert_eq!(b.state(), State::Open);
    }

    #[tokio::test]
    async fn test_open_breaker_fails_fast_without_calling_thunk() {
        let b = breaker(1, 3600);
        b.call(fail).await.ok();
        assert_eq!(b.state(), State::Open);

        let result = b.call(ok).await;
        assert!(matches!(result, Err(Cause::BreakerOpen)));
        // state must stay Open: fast-fail does not count as a recovery probe
        assert_eq!(b.state(), State::Open);
    }

    #[tokio::test]
    async fn test_half_open_success_closes_circuit() {
        let b = breaker(1, 0); // zero timeout: immediately eligible for half-open
        b.call(fail).await.ok();
        assert_eq!(b.state(), State::Open);

        let result = b.call(ok).await;
        assert!(result.is_ok());
        assert_eq!(b.state(), State::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens_circuit() {
        let b = breaker(1, 0);
        b.call(fail).await.ok();
        assert_eq!(b.state(), State::Open);

        b.call(fail).await.ok();
        assert_eq!(b.state(), State::Open);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count_while_closed() {
        let b = breaker(3, 60);
        b.call(fail).await.ok();
        b.call(fail).await.ok();
        b.call(ok).await.ok();
        // Count reset: two more failures should not trip a threshold-3 breaker.
        b.call(fail).await.ok();
        b.call(fail).await.ok();
        assert_eq!(b.state(), State::Closed);
    }

    #[test]
    fn test_is_healthy_reflects_state() {
        let b = breaker(1, 3600);
        assert!(b.is_healthy());
    }
}

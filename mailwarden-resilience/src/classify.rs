//! Maps a probe failure to one of a fixed taxonomy of operational categories.
//!
//! The taxonomy is closed by design: every probe failure must fit one of the
//! variants in [`Cause`], and [`classify`] is a total, infallible function
//! over that set.

use std::fmt;

/// The shape of a probe failure, as raised by probe check code.
#[derive(Debug, Clone)]
pub enum Cause {
    /// The owning circuit breaker refused to let the check run.
    BreakerOpen,
    /// A deadline elapsed before the check completed.
    Timeout,
    /// Name resolution failed or returned no usable records.
    Dns(String),
    /// Certificate chain or hostname validation failed, or a TLS handshake
    /// was rejected for reasons tied to the TLS layer itself.
    Cert(String),
    /// The server rejected credentials (SMTP 535 or equivalent).
    Auth(String),
    /// A generic socket error: refused, reset, unreachable, or other I/O failure.
    Network(String),
    /// A probe's own predicate rejected the server's response (e.g. wrong IP, 5xx).
    CheckFailed(String),
    /// Does not fit any of the above.
    Unknown(String),
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BreakerOpen => write!(f, "circuit breaker is open"),
            Self::Timeout => write!(f, "deadline exceeded"),
            Self::Dns(msg)
            | Self::Cert(msg)
            | Self::Auth(msg)
            | Self::Network(msg)
            | Self::CheckFailed(msg)
            | Self::Unknown(msg) => write!(f, "{msg}"),
        }
    }
}

/// The closed set of error categories surfaced in metric labels and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Network,
    Dns,
    Auth,
    Cert,
    Timeout,
    CheckFailed,
    CircuitBreaker,
    Unknown,
}

impl Category {
    /// The metric-label spelling of this category (`error_type=<this>`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Dns => "dns",
            Self::Auth => "auth",
            Self::Cert => "cert",
            Self::Timeout => "timeout",
            Self::CheckFailed => "check_failed",
            Self::CircuitBreaker => "circuit_breaker",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies a raised [`Cause`] into its [`Category`], applying a fixed
/// ordered decision rule.
///
/// When `categorization_enabled` is `false` every cause is reported as
/// [`Category::Unknown`], matching the `ENABLE_ERROR_CATEGORIZATION` toggle.
#[must_use]
pub const fn classify(cause: &Cause, categorization_enabled: bool) -> Category {
    if !categorization_enabled {
        return Category::Unknown;
    }

    match cause {
        Cause::BreakerOpen => Category::CircuitBreaker,
        Cause::Timeout => Category::Timeout,
        Cause::Dns(_) => Category::Dns,
        Cause::Cert(_) => Category::Cert,
        Cause::Auth(_) => Category::Auth,
        Cause::Network(_) => Category::Network,
        Cause::CheckFailed(_) => Category::CheckFailed,
        Cause::Unknown(_) => Category::Unknown,
    }
}

//! Environment-sourced, validated configuration record.
//!
//! Every other component treats a [`Config`] as an immutable, already-valid
//! snapshot: all bounds checking happens once, here, at startup. See
//! `defaults` for the concrete values used when an optional variable is unset.

use std::net::IpAddr;

use serde::Serialize;

use crate::domain::Domain;
use crate::error::ConfigError;

/// Fully validated process configuration, loaded once from the environment.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub server_ip: IpAddr,
    pub server_hostname: Domain,
    pub mx_domain: Domain,
    pub expected_ip: IpAddr,

    pub http_port: u16,
    pub https_port: u16,
    pub smtp_port: u16,
    pub smtp_submission_port: u16,

    pub smtp_username: String,
    #[serde(skip)]
    pub smtp_password: String,

    pub from_address: String,
    pub to_address: String,

    pub probe_collection_interval_secs: u64,
    pub metrics_export_port: u16,

    pub breaker_failure_threshold: u32,
    pub breaker_recovery_timeout_secs: u64,

    pub backoff_base_interval_secs: u64,
    pub backoff_max_interval_secs: u64,
    pub backoff_multiplier: f64,
    pub backoff_max_failures: u32,

    pub enable_error_categorization: bool,
    pub enable_enhanced_logging: bool,

    pub resource_memory_warning_mb: u64,
    pub resource_thread_warning_count: u64,
    pub resource_check_enabled: bool,
}

mod defaults {
    pub const fn probe_collection_interval_secs() -> u64 {
        30
    }

    pub const fn metrics_export_port() -> u16 {
        9090
    }

    pub const fn breaker_failure_threshold() -> u32 {
        5
    }

    pub const fn breaker_recovery_timeout_secs() -> u64 {
        60
    }

    pub const fn backoff_base_interval_secs() -> u64 {
        30
    }

    pub const fn backoff_max_interval_secs() -> u64 {
        300
    }

    pub const fn backoff_multiplier() -> f64 {
        2.0
    }

    pub const fn backoff_max_failures() -> u32 {
        5
    }

    pub const fn enable_error_categorization() -> bool {
        true
    }

    pub const fn enable_enhanced_logging() -> bool {
        false
    }

    pub const fn resource_memory_warning_mb() -> u64 {
        512
    }

    pub const fn resource_thread_warning_count() -> u64 {
        100
    }

    pub const fn resource_check_enabled() -> bool {
        true
    }
}

const PROBE_INTERVAL_MIN: u64 = 30;
const PROBE_INTERVAL_MAX: u64 = 3600;

fn required_var(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

fn required_ip(name: &'static str) -> Result<IpAddr, ConfigError> {
    let raw = required_var(name)?;
    raw.parse()
        .map_err(|_| ConfigError::InvalidValue {
            var: name,
            reason: format!("'{raw}' is not a valid IP literal"),
        })
}

fn required_port(name: &'static str) -> Result<u16, ConfigError> {
    let raw = required_var(name)?;
    let value: i64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
        var: name,
        reason: format!("'{raw}' is not an integer"),
    })?;
    if !(1..=65535).contains(&value) {
        return Err(ConfigError::OutOfRange {
            var: name,
            min: 1,
            max: 65535,
            actual: value,
        });
    }
    // u16::try_from cannot fail given the range check above.
    Ok(value as u16)
}

fn optional_parsed<T: std::str::FromStr>(
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            var: name,
            reason: format!("'{raw}' could not be parsed"),
        }),
        Err(_) => Ok(default),
    }
}

fn optional_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue {
                var: name,
                reason: format!("'{other}' is not a recognized boolean"),
            }),
        },
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads and validates configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first missing, malformed, or
    /// out-of-range value encountered. The process should exit on any error
    /// returned here without starting any probe.
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_ip = required_ip("EMAIL_SERVER_IP")?;
        let server_hostname = Domain::new(required_var("EMAIL_SERVER_HOSTNAME")?);
        let mx_domain = Domain::new(required_var("EMAIL_MX_DOMAIN")?);
        let expected_ip = required_ip("EXPECTED_IP")?;

        let http_port = required_port("EMAIL_SERVER_HTTP_PORT")?;
        let https_port = required_port("EMAIL_SERVER_HTTPS_PORT")?;
        let smtp_port = required_port("EMAIL_SERVER_SMTP_PORT")?;
        let smtp_submission_port = required_port("EMAIL_SERVER_SMTP_SECURE_PORT")?;

        let smtp_username = required_var("EMAIL_SMTP_USERNAME")?;
        let smtp_password = required_var("EMAIL_SMTP_PASSWORD")?;

        let from_address = required_var("FROM_ADDRESS")?;
        let to_address = required_var("TO_ADDRESS")?;

        let probe_collection_interval_secs = optional_parsed(
            "PROBE_COLLECTION_INTERVAL",
            defaults::probe_collection_interval_secs(),
        )?;
        if !(PROBE_INTERVAL_MIN..=PROBE_INTERVAL_MAX).contains(&probe_collection_interval_secs) {
            return Err(ConfigError::OutOfRange {
                var: "PROBE_COLLECTION_INTERVAL",
                min: PROBE_INTERVAL_MIN as i64,
                max: PROBE_INTERVAL_MAX as i64,
                actual: probe_collection_interval_secs as i64,
            });
        }

        let metrics_export_port =
            optional_parsed("METRICS_EXPORT_PORT", defaults::metrics_export_port())?;

        let breaker_failure_threshold = optional_parsed(
            "CIRCUIT_BREAKER_FAILURE_THRESHOLD",
            defaults::breaker_failure_threshold(),
        )?;
        let breaker_recovery_timeout_secs = optional_parsed(
            "CIRCUIT_BREAKER_RECOVERY_TIMEOUT",
            defaults::breaker_recovery_timeout_secs(),
        )?;

        let backoff_base_interval_secs = optional_parsed(
            "BACKOFF_BASE_INTERVAL",
            defaults::backoff_base_interval_secs(),
        )?;
        let backoff_max_interval_secs = optional_parsed(
            "BACKOFF_MAX_INTERVAL",
            defaults::backoff_max_interval_secs(),
        )?;
        let backoff_multiplier =
            optional_parsed("BACKOFF_MULTIPLIER", defaults::backoff_multiplier())?;
        let backoff_max_failures =
            optional_parsed("BACKOFF_MAX_FAILURES", defaults::backoff_max_failures())?;

        let enable_error_categorization = optional_bool(
            "ENABLE_ERROR_CATEGORIZATION",
            defaults::enable_error_categorization(),
        )?;
        let enable_enhanced_logging = optional_bool(
            "ENABLE_ENHANCED_LOGGING",
            defaults::enable_enhanced_logging(),
        )?;

        let resource_memory_warning_mb = optional_parsed(
            "RESOURCE_MEMORY_WARNING_MB",
            defaults::resource_memory_warning_mb(),
        )?;
        let resource_thread_warning_count = optional_parsed(
            "RESOURCE_THREAD_WARNING_COUNT",
            defaults::resource_thread_warning_count(),
        )?;
        let resource_check_enabled = optional_bool(
            "RESOURCE_CHECK_ENABLED",
            defaults::resource_check_enabled(),
        )?;

        Ok(Self {
            server_ip,
            server_hostname,
            mx_domain,
            expected_ip,
            http_port,
            https_port,
            smtp_port,
            smtp_submission_port,
            smtp_username,
            smtp_password,
            from_address,
            to_address,
            probe_collection_interval_secs,
            metrics_export_port,
            breaker_failure_threshold,
            breaker_recovery_timeout_secs,
            backoff_base_interval_secs,
            backoff_max_interval_secs,
            backoff_multiplier,
            backoff_max_failures,
            enable_error_categorization,
            enable_enhanced_logging,
            resource_memory_warning_mb,
            resource_thread_warning_count,
            resource_check_enabled,
        })
    }
}

//! Error types shared across the mailwarden workspace.

use thiserror::Error;

/// Errors raised while loading and validating configuration from the environment.
///
/// Any `ConfigError` is fatal: the process exits before a single probe starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    /// An environment variable's value could not be parsed into the expected type.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    /// A numeric value fell outside its documented bounds.
    #[error("{var} must be between {min} and {max}, got {actual}")]
    OutOfRange {
        var: &'static str,
        min: i64,
        max: i64,
        actual: i64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_var_display() {
        let err = ConfigError::MissingVar("EMAIL_SERVER_IP");
        assert_eq!(
            err.to_string(),
            "missing required environment variable: EMAIL_SERVER_IP"
        );
    }

    #[test]
    fn test_out_of_range_display() {
        let err = ConfigError::OutOfRange {
            var: "PROBE_COLLECTION_INTERVAL",
            min: 30,
            max: 3600,
            actual: 29,
        };
        assert_eq!(
            err.to_string(),
            "PROBE_COLLECTION_INTERVAL must be between 30 and 3600, got 29"
        );
    }
}

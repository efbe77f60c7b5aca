//! Exposition server error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HealthError {
    /// Failed to bind to the specified address.
    #[error("failed to bind exposition server to {address}: {source}")]
    BindError {
        address: String,
        source: std::io::Error,
    },

    /// The exposition server encountered a runtime error.
    #[error("exposition server error: {0}")]
    ServerError(String),
}

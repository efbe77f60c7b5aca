//! Error types for the metrics registry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    /// `init()` was called more than once.
    #[error("metrics registry already initialized")]
    AlreadyInitialized,

    /// Rendering the Prometheus text exposition format failed.
    #[error("failed to render Prometheus exposition text: {0}")]
    PrometheusExport(String),
}

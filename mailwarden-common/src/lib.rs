pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::Config;
pub use domain::Domain;
pub use error::ConfigError;
pub use tracing;

/// Process-wide coordination signal broadcast to every worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}

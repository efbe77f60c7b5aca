//! Exposition HTTP endpoints for mailwarden.
//!
//! # Endpoints
//!
//! - **`/metrics`** — Prometheus text exposition of all registered counters and gauges.
//! - **`/health`** — composite health verdict: `200` iff strictly more than half of
//!   registered probes have their breaker not open and no resource warning is active,
//!   `503` otherwise.

mod error;
mod registry;
mod server;

pub use error::HealthError;
pub use registry::{HealthStatus, ProbeCounts, ProbeRegistry, ResourceStatus};
pub use server::ExpositionServer;

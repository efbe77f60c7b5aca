//! Exposition HTTP server: `GET /metrics` and `GET /health`.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use mailwarden_common::{internal, Signal};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;

use crate::error::HealthError;
use crate::registry::{HealthStatus, ProbeCounts, ProbeRegistry, ResourceStatus};

/// Serves `/metrics` (Prometheus text) and `/health` (JSON composite),
/// per the exposition server component.
pub struct ExpositionServer {
    listener: TcpListener,
    router: Router,
}

impl ExpositionServer {
    /// Binds the exposition server to `listen_address`.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::BindError`] if the address cannot be bound;
    /// this is one of the two fatal startup errors for the whole system.
    pub async fn new(
        listen_address: &str,
        probes: Arc<ProbeRegistry>,
    ) -> Result<Self, HealthError> {
        let listener =
            TcpListener::bind(listen_address)
                .await
                .map_err(|source| HealthError::BindError {
                    address: listen_address.to_string(),
                    source,
                })?;

        tracing::info!(address = %listen_address, "exposition server bound");

        let router = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .with_state(probes)
            .layer(TimeoutLayer::new(Duration::from_secs(1)));

        Ok(Self { listener, router })
    }

    /// Runs the server until a shutdown signal is broadcast.
    ///
    /// # Errors
    ///
    /// Returns [`HealthError::ServerError`] if the underlying `axum` server
    /// returns an error.
    pub async fn serve(
        self,
        mut shutdown: tokio::sync::broadcast::Receiver<Signal>,
    ) -> Result<(), HealthError> {
        internal!(level = INFO, "exposition server starting");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                internal!(level = INFO, "exposition server received shutdown signal");
            })
            .await
            .map_err(|e| HealthError::ServerError(e.to_string()))?;

        internal!(level = INFO, "exposition server stopped");
        Ok(())
    }
}

async fn metrics_handler() -> Response {
    let body = if mailwarden_metrics::is_enabled() {
        mailwarden_metrics::metrics().render()
    } else {
        String::new()
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

async fn health_handler(State(probes): State<Arc<ProbeRegistry>>) -> Response {
    let (total, healthy) = probes.counts();

    let resources = if mailwarden_metrics::is_enabled() {
        let resource = &mailwarden_metrics::metrics().resource;
        let mut warnings = Vec::new();
        if resource.warning("memory") > 0.0 {
            warnings.push("memory".to_string());
        }
        if resource.warning("threads") > 0.0 {
            warnings.push("threads".to_string());
        }
        ResourceStatus {
            memory_mb: resource.memory_usage_mb(),
            threads: resource.thread_count(),
            warnings,
        }
    } else {
        ResourceStatus {
            memory_mb: 0.0,
            threads: 0.0,
            warnings: Vec::new(),
        }
    };

    let mut status = HealthStatus {
        status: "unhealthy",
        probes: ProbeCounts {
            total,
            healthy,
            unhealthy: total - healthy,
        },
        resources,
    };
    let healthy_overall = status.is_healthy();
    status.status = if healthy_overall { "healthy" } else { "unhealthy" };

    let code = if healthy_overall {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(status)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_handler_unhealthy_with_no_probes() {
        let probes = Arc::new(ProbeRegistry::new());
        let response = health_handler(State(probes)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_handler_healthy_majority() {
        let probes = Arc::new(ProbeRegistry::new());
        probes.register("a");
        probes.register("b");
        probes.register("c");
        probes.set_healthy("c", false);
        let response = health_handler(State(probes)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_handler_exact_half_is_unhealthy() {
        let probes = Arc::new(ProbeRegistry::new());
        probes.register("a");
        probes.register("b");
        probes.set_healthy("b", false);
        let response = health_handler(State(probes)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_handler_returns_ok() {
        let response = metrics_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

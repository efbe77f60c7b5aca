//! Wires configuration, metrics, the probe supervisor, the resource
//! watcher, and the exposition server together, then runs until a shutdown
//! signal arrives.

use std::sync::Arc;
use std::time::Duration;

use mailwarden_common::{internal, Config};
use mailwarden_health::{ExpositionServer, ProbeRegistry};
use mailwarden_probes::{Kernel, KernelConfig, ResourceWatcher, ResourceWatcherConfig, Supervisor};
use mailwarden_resilience::BreakerConfig;

/// How long the supervisor waits for straggling probe kernels to exit after
/// cancellation is broadcast.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// How often the resource watcher samples this process's own memory and
/// thread count.
const RESOURCE_SAMPLE_INTERVAL_SECS: u64 = 30;

#[tokio::main]
async fn main() {
    mailwarden_common::logging::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "configuration validation failed, refusing to start");
            std::process::exit(1);
        }
    };

    mailwarden_metrics::init().expect("mailwarden_metrics::init must run exactly once at startup");

    let registry = Arc::new(ProbeRegistry::new());
    let supervisor = Supervisor::new(Arc::clone(&registry));

    let listen_address = format!("0.0.0.0:{}", config.metrics_export_port);
    let health_server = match ExpositionServer::new(&listen_address, Arc::clone(&registry)).await {
        Ok(server) => server,
        Err(err) => {
            tracing::error!(error = %err, "failed to bind exposition server, refusing to start");
            std::process::exit(1);
        }
    };

    let kernel_config = KernelConfig {
        base_interval_secs: config.probe_collection_interval_secs,
        backoff_base_interval_secs: config.backoff_base_interval_secs,
        breaker: BreakerConfig::new(
            config.breaker_failure_threshold,
            config.breaker_recovery_timeout_secs,
        ),
        backoff_multiplier: config.backoff_multiplier,
        backoff_max_interval_secs: config.backoff_max_interval_secs,
        backoff_max_failures: config.backoff_max_failures,
        categorization_enabled: config.enable_error_categorization,
    };

    let kernels: Vec<Kernel> = mailwarden_probes::build_all(&config)
        .into_iter()
        .map(|probe| Kernel::new(probe, kernel_config, Arc::clone(&registry)))
        .collect();

    tracing::info!(probe_count = kernels.len(), "starting probe kernels");
    let probe_tasks = supervisor.spawn(kernels);

    let resource_watcher = ResourceWatcher::new(ResourceWatcherConfig {
        sample_interval_secs: RESOURCE_SAMPLE_INTERVAL_SECS,
        memory_warning_mb: config.resource_memory_warning_mb,
        thread_warning_count: config.resource_thread_warning_count,
        enabled: config.resource_check_enabled,
    });
    let resource_task = tokio::spawn(resource_watcher.run(supervisor.subscribe()));

    let health_task = tokio::spawn(health_server.serve(supervisor.subscribe()));

    wait_for_shutdown_signal().await;
    internal!(level = INFO, "shutdown signal received, stopping probe kernels");

    supervisor.shutdown(probe_tasks, SHUTDOWN_GRACE).await;

    if tokio::time::timeout(SHUTDOWN_GRACE, resource_task).await.is_err() {
        internal!(level = WARN, "resource watcher did not exit within the grace period");
    }

    match tokio::time::timeout(SHUTDOWN_GRACE, health_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(err))) => tracing::warn!(error = %err, "exposition server exited with an error"),
        Ok(Err(err)) => tracing::warn!(error = %err, "exposition server task panicked"),
        Err(_) => internal!(level = WARN, "exposition server did not exit within the grace period"),
    }

    internal!(level = INFO, "mailwarden stopped");
}

/// Waits for SIGTERM or Ctrl+C. On non-Unix targets only Ctrl+C is available.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                internal!(level = INFO, "received Ctrl+C");
            }
            _ = terminate.recv() => {
                internal!(level = INFO, "received SIGTERM");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        internal!(level = INFO, "received Ctrl+C");
    }
}

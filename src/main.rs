use jaeger_upgrade::config::OperatorConfig;
use jaeger_upgrade::server::{
    create_metrics, run_health_server, shutdown_channel, shutdown_on_signal, ReadinessState,
};
use jaeger_upgrade::upgrade::{default_registry, KubeJaegerStore, Upgrader};
use kube::Client;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = OperatorConfig::from_env()?;
    info!(
        identity = %config.identity,
        scope = %config.scope,
        concurrency = config.concurrency,
        interval_secs = config.upgrade_interval.map(|d| d.as_secs()),
        "Starting Jaeger upgrade operator"
    );

    // A broken migration table is a packaging bug, refuse to start
    let registry = match default_registry() {
        Ok(registry) => registry,
        Err(e) => {
            error!(error = %e, "Invalid migration registry");
            return Err(e.into());
        }
    };
    info!(
        versions = registry.len(),
        latest = %registry.latest().map(|node| node.version().to_string()).unwrap_or_default(),
        "Migration registry loaded"
    );

    // kube's rustls stack needs a process-wide provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let (shutdown_controller, shutdown_signal) = shutdown_channel();
    let signal_handle = shutdown_on_signal(shutdown_controller.clone());
    let readiness = ReadinessState::new();
    let metrics = create_metrics()?;

    let health_handle = {
        let readiness = readiness.clone();
        let metrics = metrics.clone();
        let signal = shutdown_signal.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(port, readiness, metrics, signal).await {
                error!(error = %e, "Health server failed");
            }
        })
    };

    let client = match Client::try_default().await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to create Kubernetes client");
            return Err(e.into());
        }
    };
    info!("Connected to Kubernetes cluster");

    let store = KubeJaegerStore::new(client, config.scope.clone());
    let upgrader = Upgrader::new(Arc::new(registry), config.identity.clone())
        .with_concurrency(config.concurrency)
        .with_metrics(metrics);

    readiness.set_ready();

    // Runs to completion: a signal only stops the loop between passes
    upgrader
        .run_until_shutdown(&store, config.upgrade_interval, shutdown_signal)
        .await;
    info!("Upgrade loop finished");

    readiness.set_not_ready();
    shutdown_controller.shutdown();
    signal_handle.abort();
    if let Err(e) = health_handle.await {
        error!(error = %e, "Health server task panicked");
    }

    info!("Jaeger upgrade operator shut down");
    Ok(())
}

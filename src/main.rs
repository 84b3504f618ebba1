// src/main.rs
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use argus::{
    config::{self, DEFAULT_CONFIG_PATH},
    logging::{self, AccessLog},
    metrics::{start_metrics_server, MetricsRegistry},
    proxy::Proxy,
    server::{shutdown_signal, RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = config::load_config(&config_path).await?;

    // Initialize tracing
    let log_path = config.resolved_log_path()?;
    logging::init(log_path.as_deref())?;
    info!("Loaded configuration from: {}", config_path);

    // Initialize metrics
    let metrics = if config.metrics.enabled {
        let registry = Arc::new(MetricsRegistry::new()?);
        let collector = registry.collector();
        collector.set_backend_count(config.backends.len());

        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, registry, config.metrics.path.clone()).await?;
        Some(collector)
    } else {
        None
    };

    // Create proxy
    let sink = Arc::new(AccessLog::new(metrics.clone()));
    let proxy = Arc::new(Proxy::from_config(&config, sink, metrics)?);
    info!(
        backends = proxy.registry().size(),
        mode = ?config.forward_mode,
        "Forwarding to {}",
        proxy
            .registry()
            .backends()
            .iter()
            .map(|b| b.address())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if config.attempt_timeout_ms.is_none() {
        info!("No attempt timeout configured; an unresponsive backend stalls its request");
    }

    // Start main server
    ServerBuilder::new(config.bind_address())
        .with_handler(RequestHandler::new(proxy))
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration (fail fast: invalid config is fatal)
//! - Initialize logging and metrics
//! - Bind the listener, start the watcher and signal handlers
//! - Serve traffic last, once everything else is ready

use std::path::Path;

use crate::config::load_config;
use crate::config::watcher::ConfigWatcher;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::net::Listener;
use crate::observability::{logging, metrics};

/// Load the config at `config_path` and run the gateway until shutdown.
///
/// Every startup error is fatal; the gateway never serves traffic with
/// a partial or invalid configuration.
pub async fn run(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;

    logging::init(&config.observability.log_level);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        routes = config.routes.len(),
        fallbacks = config.fallbacks.len(),
        resolver = %config.resolver.strategy,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = Listener::bind(&config.listener).await?;

    let (watcher, config_updates) = ConfigWatcher::new(config_path);
    let reload_tx = watcher.sender();
    // The watcher handle must stay alive for change events to fire.
    let _watcher = watcher.run()?;

    let shutdown = Shutdown::new();
    signals::spawn(shutdown.clone(), config_path.to_path_buf(), reload_tx);

    let server = HttpServer::new(config)?;
    server
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

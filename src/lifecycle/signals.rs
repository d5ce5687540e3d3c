//! OS signal handling.
//!
//! # Responsibilities
//! - Translate SIGTERM/SIGINT into a graceful shutdown
//! - Translate SIGHUP into a config reload
//!
//! # Design Decisions
//! - SIGHUP reloads feed the same update channel as the file watcher,
//!   so both reload paths get identical validation and swap behavior
//! - A failed SIGHUP reload keeps the current configuration

use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::config::{load_config, GatewayConfig};
use crate::lifecycle::Shutdown;

/// Spawn the signal handling task.
///
/// On unix: SIGTERM and SIGINT trigger shutdown, SIGHUP triggers a
/// reload. Elsewhere only Ctrl+C is handled.
#[cfg(unix)]
pub fn spawn(
    shutdown: Shutdown,
    config_path: PathBuf,
    reload_tx: mpsc::UnboundedSender<GatewayConfig>,
) {
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint, mut sighup) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        ) {
            (Ok(t), Ok(i), Ok(h)) => (t, i, h),
            _ => {
                tracing::error!("Failed to install signal handlers");
                return;
            }
        };

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("SIGTERM received, shutting down");
                    shutdown.trigger();
                    return;
                }
                _ = sigint.recv() => {
                    tracing::info!("SIGINT received, shutting down");
                    shutdown.trigger();
                    return;
                }
                _ = sighup.recv() => {
                    tracing::info!("SIGHUP received, reloading configuration");
                    match load_config(&config_path) {
                        Ok(config) => {
                            let _ = reload_tx.send(config);
                        }
                        Err(e) => {
                            tracing::error!(
                                error = %e,
                                "Reload failed; keeping current configuration"
                            );
                        }
                    }
                }
            }
        }
    });
}

#[cfg(not(unix))]
pub fn spawn(
    shutdown: Shutdown,
    _config_path: PathBuf,
    _reload_tx: mpsc::UnboundedSender<GatewayConfig>,
) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received, shutting down");
            shutdown.trigger();
        }
    });
}

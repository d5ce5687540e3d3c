//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Apply the configured default filter, overridable via RUST_LOG
//!
//! # Design Decisions
//! - RUST_LOG wins over the config directive, so operators can turn up
//!   verbosity without touching the config file

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global tracing subscriber.
///
/// `default_directive` comes from the config file and is used only when
/// RUST_LOG is unset or unparseable.
pub fn init(default_directive: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_directive.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all gateway handler
//! - Wire up middleware (request id, tracing, timeout, body limit)
//! - Serve on the bounded listener with graceful shutdown
//! - Swap in new engine generations on config reload
//! - Run the bucket eviction sweeper
//!
//! # Design Decisions
//! - The live engine sits behind an ArcSwap: readers grab the whole
//!   generation with one atomic load, in-flight requests finish on the
//!   generation they started with
//! - A rejected reload is logged and dropped; the previous generation
//!   keeps serving

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, Response},
    routing::any,
    Router,
};
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::request_id::MakeRequestUuid;
use crate::net::{ClientAddr, Listener};
use crate::proxy::{EngineBuildError, ProxyEngine};

/// How often idle rate-limit buckets are swept.
const BUCKET_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// The live engine generation.
    pub inner: Arc<ArcSwap<ProxyEngine>>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
    state: AppState,
}

impl HttpServer {
    /// Build the server from a validated configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, EngineBuildError> {
        let engine = ProxyEngine::from_config(&config)?;
        let state = AppState {
            inner: Arc::new(ArcSwap::from_pointee(engine)),
        };
        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(gateway_handler))
            .route("/{*path}", any(gateway_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    )))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until the shutdown signal fires.
    ///
    /// `config_updates` carries validated configs from the file watcher
    /// and the SIGHUP handler; each one becomes a new engine generation.
    pub async fn run(
        self,
        listener: Listener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.config.routes.len(),
            "HTTP server starting"
        );

        // Reload task: build-then-swap, never mutate the live generation.
        let reload_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                match ProxyEngine::from_config(&new_config) {
                    Ok(engine) => {
                        reload_state.inner.store(Arc::new(engine));
                        tracing::info!(
                            routes = new_config.routes.len(),
                            "Engine generation swapped"
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            "Rejected reloaded config; previous generation keeps serving"
                        );
                    }
                }
            }
        });

        // Idle bucket sweeper for the current generation; exits with the
        // server so embedded gateways do not leak the task.
        let sweep_state = self.state.clone();
        let mut sweep_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(BUCKET_SWEEP_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        sweep_state.inner.load().limiter().evict_idle();
                    }
                    _ = sweep_shutdown.recv() => break,
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<ClientAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The server's configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// Catch-all handler: every request goes through the proxy engine.
async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(ClientAddr(peer)): ConnectInfo<ClientAddr>,
    request: Request<Body>,
) -> Response<Body> {
    // One load pins this request to a single generation for its lifetime.
    let engine = state.inner.load_full();
    engine.handle(request, peer).await
}

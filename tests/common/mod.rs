//! Shared utilities for integration testing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use api_gateway::config::schema::RouteConfig;
use api_gateway::config::GatewayConfig;
use api_gateway::http::HttpServer;
use api_gateway::lifecycle::Shutdown;
use api_gateway::net::Listener;

/// Start a mock backend on an ephemeral port returning a fixed 200 body.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        // Drain the request head before answering.
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Reserve an address nothing is listening on (connect refused).
pub async fn dead_upstream_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A base config suitable for tests: metrics off, short ceilings.
pub fn base_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.observability.metrics_enabled = false;
    config.timeouts.request_secs = 10;
    config
}

/// A route config pointing at `upstream` with permissive default policies.
pub fn route_to(id: &str, prefix: &str, upstream: SocketAddr) -> RouteConfig {
    RouteConfig {
        id: id.to_string(),
        methods: None,
        path_prefix: Some(prefix.to_string()),
        host: None,
        upstream: format!("http://{upstream}"),
        timeout_ms: 2_000,
        rate_limit: Default::default(),
        circuit_breaker: Default::default(),
        fallback_id: None,
    }
}

/// Spawn a gateway on an ephemeral port.
///
/// Returns its address, the shutdown handle, and the config update
/// channel (the same one the file watcher would feed).
pub async fn spawn_gateway(
    config: GatewayConfig,
) -> (SocketAddr, Shutdown, mpsc::UnboundedSender<GatewayConfig>) {
    let listener = Listener::bind_addr("127.0.0.1:0".parse().unwrap(), 1024)
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (update_tx, update_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, update_rx, server_shutdown).await;
    });

    (addr, shutdown, update_tx)
}

/// A non-pooled client, so every request opens a fresh connection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

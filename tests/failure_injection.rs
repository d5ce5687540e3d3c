//! Failure injection tests: breaker behavior, fallbacks, timeouts.

use std::time::Duration;

use api_gateway::config::schema::{BreakerConfig, FallbackConfig};
use tokio::net::TcpListener;

mod common;

fn quick_breaker() -> BreakerConfig {
    BreakerConfig {
        failure_rate_threshold: 0.5,
        sliding_window: 10,
        minimum_calls: 3,
        open_duration_ms: 60_000,
        half_open_trials: 2,
    }
}

fn payments_fallback() -> FallbackConfig {
    FallbackConfig {
        id: "payments-down".to_string(),
        status: 503,
        content_type: "text/plain; charset=utf-8".to_string(),
        body: "Payment Service is Down.".to_string(),
    }
}

#[tokio::test]
async fn unreachable_upstream_trips_breaker_and_serves_fallback() {
    let dead = common::dead_upstream_addr().await;

    let mut config = common::base_config();
    let mut route = common::route_to("payments", "/", dead);
    route.circuit_breaker = quick_breaker();
    route.fallback_id = Some("payments-down".to_string());
    config.routes.push(route);
    config.fallbacks.push(payments_fallback());

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{addr}/pay");

    // Every transport failure serves the fallback and feeds the window.
    for _ in 0..3 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 503);
        assert_eq!(res.text().await.unwrap(), "Payment Service is Down.");
    }

    // Breaker is now open: still the fallback, without contacting the
    // upstream (no connect delay to a dead address).
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "Payment Service is Down.");

    shutdown.trigger();
}

#[tokio::test]
async fn upstream_failure_without_fallback_is_502() {
    let dead = common::dead_upstream_addr().await;

    let mut config = common::base_config();
    config.routes.push(common::route_to("orders", "/", dead));

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let res = common::client()
        .get(format!("http://{addr}/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 502);

    shutdown.trigger();
}

#[tokio::test]
async fn breaker_recovers_through_half_open_probes() {
    // Reserve a port, leave it dead for the failure phase.
    let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let upstream_addr = upstream.local_addr().unwrap();
    drop(upstream);

    let mut config = common::base_config();
    let mut route = common::route_to("r1", "/", upstream_addr);
    route.circuit_breaker = BreakerConfig {
        open_duration_ms: 500,
        ..quick_breaker()
    };
    route.fallback_id = Some("payments-down".to_string());
    config.routes.push(route);
    config.fallbacks.push(payments_fallback());

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{addr}/");

    for _ in 0..3 {
        assert_eq!(client.get(&url).send().await.unwrap().status(), 503);
    }
    // Open: fast-fail without touching the upstream.
    assert_eq!(client.get(&url).send().await.unwrap().status(), 503);

    // Upstream comes back on the same address.
    let listener = TcpListener::bind(upstream_addr).await.unwrap();
    tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                    .await;
                let _ = socket.shutdown().await;
            });
        }
    });

    // After the open duration, probes flow; two successes reclose.
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);

    // Closed again: everything passes.
    for _ in 0..5 {
        assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn upstream_timeout_is_a_failure_served_via_fallback() {
    let slow = common::start_programmable_backend(|| async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        (200, "late".to_string())
    })
    .await;

    let mut config = common::base_config();
    let mut route = common::route_to("payments", "/", slow);
    route.timeout_ms = 100;
    route.fallback_id = Some("payments-down".to_string());
    config.routes.push(route);
    config.fallbacks.push(payments_fallback());

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let res = common::client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(res.text().await.unwrap(), "Payment Service is Down.");

    shutdown.trigger();
}

#[tokio::test]
async fn upstream_error_statuses_pass_through_as_successes() {
    let failing = common::start_programmable_backend(|| async { (500, "boom".to_string()) }).await;

    let mut config = common::base_config();
    let mut route = common::route_to("r1", "/", failing);
    route.circuit_breaker = quick_breaker();
    config.routes.push(route);

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{addr}/");

    // 5xx bodies are proxied verbatim and never trip the breaker: only
    // timeouts and transport errors count as failures.
    for _ in 0..10 {
        let res = client.get(&url).send().await.unwrap();
        assert_eq!(res.status(), 500);
        assert_eq!(res.text().await.unwrap(), "boom");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn unknown_path_is_404() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = common::base_config();
    config.routes.push(common::route_to("api", "/api", backend));

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let res = common::client()
        .get(format!("http://{addr}/unknown"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    shutdown.trigger();
}

#[tokio::test]
async fn json_fallback_body_served_verbatim() {
    let dead = common::dead_upstream_addr().await;

    let mut config = common::base_config();
    let mut route = common::route_to("quotes", "/", dead);
    route.fallback_id = Some("quotes-down".to_string());
    config.routes.push(route);
    config.fallbacks.push(FallbackConfig {
        id: "quotes-down".to_string(),
        status: 503,
        content_type: "application/json".to_string(),
        body: r#"{"error":"quote service unavailable"}"#.to_string(),
    });

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let res = common::client()
        .get(format!("http://{addr}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 503);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "application/json"
    );
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "quote service unavailable");

    shutdown.trigger();
}

//! Rate limiting tests against a running gateway.

use std::time::Duration;

use api_gateway::config::schema::LimiterConfig;

mod common;

#[tokio::test]
async fn burst_then_throttle_then_refill() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = common::base_config();
    let mut route = common::route_to("r1", "/", backend);
    route.rate_limit = LimiterConfig {
        capacity: 2,
        refill_per_sec: 1.0,
    };
    config.routes.push(route);

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{addr}/");

    // Two immediate requests ride the initial burst.
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);

    // Third is throttled with a Retry-After hint.
    let res = client.get(&url).send().await.unwrap();
    assert_eq!(res.status(), 429);
    let retry_after: u64 = res
        .headers()
        .get("retry-after")
        .expect("429 must carry Retry-After")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    // One refill period later a token has accrued.
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn header_strategy_partitions_per_key() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = common::base_config();
    config.resolver.strategy = "header:X-User-Id".to_string();
    let mut route = common::route_to("r1", "/", backend);
    route.rate_limit = LimiterConfig {
        capacity: 1,
        refill_per_sec: 0.01,
    };
    config.routes.push(route);

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{addr}/");

    // Alice exhausts her bucket; Bob's is untouched.
    let alice = client.get(&url).header("X-User-Id", "alice");
    assert_eq!(alice.send().await.unwrap().status(), 200);
    let alice = client.get(&url).header("X-User-Id", "alice");
    assert_eq!(alice.send().await.unwrap().status(), 429);
    let bob = client.get(&url).header("X-User-Id", "bob");
    assert_eq!(bob.send().await.unwrap().status(), 200);

    // Requests without the header share the fallback partition.
    assert_eq!(client.get(&url).send().await.unwrap().status(), 200);
    assert_eq!(client.get(&url).send().await.unwrap().status(), 429);

    shutdown.trigger();
}

#[tokio::test]
async fn concurrent_burst_cannot_double_spend() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = common::base_config();
    let mut route = common::route_to("r1", "/", backend);
    route.rate_limit = LimiterConfig {
        capacity: 10,
        refill_per_sec: 0.001,
    };
    config.routes.push(route);

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{addr}/");

    let mut handles = Vec::new();
    for _ in 0..30 {
        let client = client.clone();
        let url = url.clone();
        handles.push(tokio::spawn(
            async move { client.get(&url).send().await.unwrap().status().as_u16() },
        ));
    }

    let mut allowed = 0;
    let mut throttled = 0;
    for handle in handles {
        match handle.await.unwrap() {
            200 => allowed += 1,
            429 => throttled += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    // Exactly the bucket capacity gets through; refill is negligible.
    assert_eq!(allowed, 10);
    assert_eq!(throttled, 20);

    shutdown.trigger();
}

#[tokio::test]
async fn constant_strategy_is_one_global_budget() {
    let backend = common::start_mock_backend("ok").await;

    let mut config = common::base_config();
    // The default strategy; spelled out because it is the point.
    config.resolver.strategy = "constant:userkey".to_string();
    let mut route = common::route_to("r1", "/", backend);
    route.rate_limit = LimiterConfig {
        capacity: 1,
        refill_per_sec: 0.01,
    };
    config.routes.push(route);

    let (addr, shutdown, _) = common::spawn_gateway(config).await;
    let client = common::client();
    let url = format!("http://{addr}/");

    // Distinct users still drain the same bucket.
    let first = client.get(&url).header("X-User-Id", "alice");
    assert_eq!(first.send().await.unwrap().status(), 200);
    let second = client.get(&url).header("X-User-Id", "bob");
    assert_eq!(second.send().await.unwrap().status(), 429);

    shutdown.trigger();
}

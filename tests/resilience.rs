//! Circuit breaker and fallback behaviour through the full gateway.

use axum::http::StatusCode;
use serde_json::Value;
use std::time::Duration;

mod common;

use common::MockReply;

const WEATHER_FALLBACK: &str = "Weather service is temporarily unavailable. Please try again later.";

async fn get(gateway: std::net::SocketAddr, path: &str) -> reqwest::Response {
    common::client()
        .get(format!("http://{gateway}{path}"))
        .bearer_auth(common::user_token())
        .send()
        .await
        .unwrap()
}

fn assert_fallback(body: &Value, service: &str, message: &str) {
    assert_eq!(body["service"], service);
    assert_eq!(body["status"], 503);
    assert_eq!(body["message"], message);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
}

#[tokio::test]
async fn slow_backend_trips_breaker_and_short_circuits() {
    let weather = common::start_backend(|_| MockReply::ok("{}").delayed(Duration::from_secs(1))).await;
    let mut config = common::test_config();
    common::set_service(&mut config, "weather-service", weather.addr);
    config.timeouts.upstream_ms = 200;
    let (gateway, shutdown) = common::start_gateway(config).await;

    for _ in 0..5 {
        let res = get(gateway, "/api/weather/london").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_fallback(&res.json().await.unwrap(), "weather-service", WEATHER_FALLBACK);
    }
    assert_eq!(weather.hits(), 5);

    // Open: answered without touching the backend.
    for _ in 0..3 {
        let res = get(gateway, "/api/weather/paris").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_fallback(&res.json().await.unwrap(), "weather-service", WEATHER_FALLBACK);
    }
    assert_eq!(weather.hits(), 5);

    shutdown.trigger();
}

#[tokio::test]
async fn half_open_trial_closes_breaker_after_recovery() {
    let news = common::start_backend(|hit| {
        if hit < 5 {
            MockReply::status(500, r#"{"error":"boom"}"#)
        } else {
            MockReply::ok(r#"{"headlines":[]}"#)
        }
    })
    .await;
    let mut config = common::test_config();
    common::set_service(&mut config, "news-service", news.addr);
    config.circuit_breaker.cool_down_ms = 300;
    let (gateway, shutdown) = common::start_gateway(config).await;

    for _ in 0..5 {
        let res = get(gateway, "/api/news/today").await;
        // Backend 5xx passes through verbatim.
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.text().await.unwrap(), r#"{"error":"boom"}"#);
    }

    let res = get(gateway, "/api/news/today").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(news.hits(), 5);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let res = get(gateway, "/api/news/today").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(news.hits(), 6);

    // Closed again: traffic flows normally.
    for _ in 0..3 {
        assert_eq!(get(gateway, "/api/news/today").await.status(), StatusCode::OK);
    }
    assert_eq!(news.hits(), 9);

    shutdown.trigger();
}

#[tokio::test]
async fn failed_trial_reopens_breaker() {
    let news = common::start_backend(|_| MockReply::status(502, "bad gateway")).await;
    let mut config = common::test_config();
    common::set_service(&mut config, "news-service", news.addr);
    config.circuit_breaker.cool_down_ms = 200;
    let (gateway, shutdown) = common::start_gateway(config).await;

    for _ in 0..5 {
        assert_eq!(get(gateway, "/api/news/today").await.status(), StatusCode::BAD_GATEWAY);
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(get(gateway, "/api/news/today").await.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(news.hits(), 6);

    // Trial failed: open for another cool-down.
    assert_eq!(
        get(gateway, "/api/news/today").await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(news.hits(), 6);

    shutdown.trigger();
}

#[tokio::test]
async fn refused_connection_returns_fallback() {
    // test_config points every service at a closed port.
    let (gateway, shutdown) = common::start_gateway(common::test_config()).await;

    let res = get(gateway, "/api/stocks/AAPL").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_fallback(
        &res.json().await.unwrap(),
        "financial-service",
        "Financial service is temporarily unavailable. Please try again later.",
    );

    shutdown.trigger();
}

#[tokio::test]
async fn route_to_unregistered_service_returns_fallback() {
    let mut config = common::test_config();
    config
        .routes
        .push(edge_gateway::config::RouteConfig::new("/api/ghost", "ghost-service"));
    let (gateway, shutdown) = common::start_gateway(config).await;

    let res = get(gateway, "/api/ghost/boo").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_fallback(
        &res.json().await.unwrap(),
        "ghost-service",
        "Ghost service is temporarily unavailable. Please try again later.",
    );

    shutdown.trigger();
}

#[tokio::test]
async fn breakers_are_isolated_per_service() {
    let news = common::start_mock_backend(r#"{"headlines":[]}"#).await;
    let mut config = common::test_config();
    common::set_service(&mut config, "news-service", news.addr);
    let (gateway, shutdown) = common::start_gateway(config).await;

    // weather-service points at a closed port and trips its breaker.
    for _ in 0..6 {
        let res = get(gateway, "/api/weather/london").await;
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    let res = get(gateway, "/api/news/today").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(news.hits(), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn body_stalled_after_headers_times_out_and_trips_breaker() {
    let weather = common::start_backend(|_| MockReply::truncated("partial", 100)).await;
    let mut config = common::test_config();
    common::set_service(&mut config, "weather-service", weather.addr);
    config.timeouts.upstream_ms = 200;
    let (gateway, shutdown) = common::start_gateway(config).await;

    for _ in 0..5 {
        let res = tokio::time::timeout(Duration::from_secs(3), get(gateway, "/api/weather/london"))
            .await
            .expect("gateway must not hang on a stalled body");
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_fallback(&res.json().await.unwrap(), "weather-service", WEATHER_FALLBACK);
    }
    assert_eq!(weather.hits(), 5);

    let res = get(gateway, "/api/weather/london").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(weather.hits(), 5);

    shutdown.trigger();
}

#[tokio::test]
async fn abandoned_requests_count_as_failures() {
    let weather = common::start_backend(|_| MockReply::ok("{}").delayed(Duration::from_secs(30))).await;
    let mut config = common::test_config();
    common::set_service(&mut config, "weather-service", weather.addr);
    config.timeouts.upstream_ms = 60_000;
    let (gateway, shutdown) = common::start_gateway(config).await;

    for i in 1..=5 {
        let call = tokio::spawn(get(gateway, "/api/weather/london"));
        common::wait_for_hits(&weather, i).await;
        // Client hangs up while the backend is still working.
        call.abort();
        let _ = call.await;
    }
    // Let the gateway notice the closed connections.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let res = tokio::time::timeout(Duration::from_secs(3), get(gateway, "/api/weather/london"))
        .await
        .expect("breaker should short-circuit");
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_fallback(&res.json().await.unwrap(), "weather-service", WEATHER_FALLBACK);
    assert_eq!(weather.hits(), 5);

    shutdown.trigger();
}

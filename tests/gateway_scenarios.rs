//! End-to-end behaviour of the gateway router against a mock upstream.

use api_gateway::config::{FilterConfig, RateLimitConfig};
use api_gateway::GatewayServer;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;

mod common;

use common::{body_json, gateway_config, mint_token, rate_limit, single_route_config, SECRET};

fn get(path: &str) -> Request<Body> {
    Request::get(path).body(Body::empty()).unwrap()
}

fn get_with_bearer(path: &str, token: &str) -> Request<Body> {
    Request::get(path)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_auth_path_is_forwarded_without_token() {
    let (upstream, received) = common::start_mock_upstream(Duration::ZERO).await;
    let app = GatewayServer::new(&gateway_config(upstream)).unwrap().router();

    let response = app.oneshot(get("/api/v1/auth/login")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "19");
    assert_eq!(response.headers()["x-ratelimit-burst-capacity"], "20");

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].request_line, "GET /api/v1/auth/login HTTP/1.1");
    assert!(received[0].header("x-request-id").is_some());
    assert_eq!(received[0].header("host"), Some(upstream.to_string().as_str()));
}

#[tokio::test]
async fn test_protected_path_without_token_is_401() {
    let (upstream, received) = common::start_mock_upstream(Duration::ZERO).await;
    let app = GatewayServer::new(&gateway_config(upstream)).unwrap().router();

    let response = app.oneshot(get("/api/v1/users/42")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["message"], "Missing or invalid Authorization header");
    assert_eq!(body["path"], "/api/v1/users/42");
    assert!(received.lock().is_empty());
}

#[tokio::test]
async fn test_protected_path_with_valid_token_is_forwarded() {
    let (upstream, received) = common::start_mock_upstream(Duration::ZERO).await;
    let app = GatewayServer::new(&gateway_config(upstream)).unwrap().router();
    let token = mint_token(SECRET, "user-42", 3600);

    let response = app.oneshot(get_with_bearer("/api/v1/orders", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"upstream-ok");

    let received = received.lock();
    assert_eq!(received[0].request_line, "GET /api/v1/orders HTTP/1.1");
    // The credential is passed through untouched
    assert_eq!(
        received[0].header("authorization"),
        Some(format!("Bearer {}", token).as_str())
    );
}

#[tokio::test]
async fn test_unmatched_path_is_404() {
    let (upstream, received) = common::start_mock_upstream(Duration::ZERO).await;
    let app = GatewayServer::new(&gateway_config(upstream)).unwrap().router();

    let response = app.oneshot(get("/unknown/path")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["message"], "Service not found");
    assert_eq!(body["path"], "/unknown/path");
    assert!(body.get("requestId").is_none());
    assert!(received.lock().is_empty());
}

#[tokio::test]
async fn test_expired_and_foreign_tokens_are_rejected() {
    let (upstream, received) = common::start_mock_upstream(Duration::ZERO).await;
    let app = GatewayServer::new(&gateway_config(upstream)).unwrap().router();

    let expired = mint_token(SECRET, "user-42", -3600);
    let foreign = mint_token("some-other-secret-with-enough-bytes-0000", "user-42", 3600);

    for token in [expired, foreign] {
        let response = app
            .clone()
            .oneshot(get_with_bearer("/api/v1/users/42", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response.into_body()).await;
        assert_eq!(body["message"], "Invalid JWT token");
    }
    assert!(received.lock().is_empty());
}

#[tokio::test]
async fn test_burst_exhaustion_is_429() {
    let (upstream, received) = common::start_mock_upstream(Duration::ZERO).await;
    let config = single_route_config(upstream, vec![rate_limit(0.01, 3)]);
    let app = GatewayServer::new(&config).unwrap().router();

    for _ in 0..3 {
        let response = app.clone().oneshot(get("/anything")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(get("/anything")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], 429);
    assert_eq!(body["message"], "Too many requests");
    assert_eq!(received.lock().len(), 3);
}

#[tokio::test]
async fn test_rate_limit_runs_before_authentication_whatever_the_config_order() {
    let (upstream, _) = common::start_mock_upstream(Duration::ZERO).await;
    let config = single_route_config(
        upstream,
        vec![FilterConfig::Authentication, rate_limit(0.01, 1), FilterConfig::Logging],
    );
    let app = GatewayServer::new(&config).unwrap().router();

    // The first request spends the only token, then fails authentication
    let first = app.clone().oneshot(get("/api/v1/users/1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::UNAUTHORIZED);

    let second = app.oneshot(get("/api/v1/users/1")).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_authentication_rejection_keeps_rate_limit_headers() {
    let (upstream, received) = common::start_mock_upstream(Duration::ZERO).await;
    let config = single_route_config(
        upstream,
        vec![rate_limit(10.0, 20), FilterConfig::Authentication],
    );
    let app = GatewayServer::new(&config).unwrap().router();

    let response = app.oneshot(get("/api/v1/orders/1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "19");
    assert_eq!(response.headers()["x-ratelimit-burst-capacity"], "20");
    assert_eq!(response.headers()["x-ratelimit-requested-tokens"], "1");
    assert!(received.lock().is_empty());
}

#[tokio::test]
async fn test_requested_tokens_drain_bucket_faster() {
    let (upstream, _) = common::start_mock_upstream(Duration::ZERO).await;
    let config = single_route_config(
        upstream,
        vec![FilterConfig::RateLimit(RateLimitConfig {
            replenish_rate: 0.01,
            burst_capacity: 4,
            requested_tokens: 2,
            ..RateLimitConfig::default()
        })],
    );
    let app = GatewayServer::new(&config).unwrap().router();

    let mut statuses = Vec::new();
    for _ in 0..3 {
        let response = app.clone().oneshot(get("/anything")).await.unwrap();
        statuses.push(response.status().as_u16());
    }
    assert_eq!(statuses, [200, 200, 429]);
}

#[tokio::test]
async fn test_unreachable_upstream_is_500() {
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let config = single_route_config(closed, vec![]);
    let app = GatewayServer::new(&config).unwrap().router();

    let response = app.oneshot(get("/api/v1/smartphones")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response.into_body()).await;
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn test_slow_upstream_times_out_as_500() {
    let (upstream, _) = common::start_mock_upstream(Duration::from_secs(3)).await;
    let mut config = single_route_config(upstream, vec![]);
    config.upstream.timeout_secs = 1;
    let app = GatewayServer::new(&config).unwrap().router();

    let response = app.oneshot(get("/slow")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_route_resolution_is_deterministic() {
    let (upstream, received) = common::start_mock_upstream(Duration::ZERO).await;
    let app = GatewayServer::new(&gateway_config(upstream)).unwrap().router();

    for _ in 0..3 {
        let response = app.clone().oneshot(get("/api/v1/smartphones/7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-ratelimit-remaining").is_none());
    }
    assert!(received
        .lock()
        .iter()
        .all(|r| r.request_line == "GET /api/v1/smartphones/7 HTTP/1.1"));
}

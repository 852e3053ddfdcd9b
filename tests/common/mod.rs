//! Shared utilities for integration tests.

#![allow(dead_code)]

use api_gateway::config::{FilterConfig, GatewayConfig, RateLimitConfig, RouteConfig};
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing_subscriber::fmt::MakeWriter;

pub const SECRET: &str = "testSecretKeyForJWTTokenTestingPurposes1234567890";

/// Request head as seen by the mock upstream.
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub type Received = Arc<Mutex<Vec<ReceivedRequest>>>;

/// Start a mock upstream on an ephemeral port that answers every request
/// with `200 upstream-ok` after `delay`, recording each request head.
pub async fn start_mock_upstream(delay: Duration) -> (SocketAddr, Received) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received: Received = Arc::new(Mutex::new(Vec::new()));
    let log = received.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let log = log.clone();
                    tokio::spawn(async move {
                        let mut buf = Vec::new();
                        let mut chunk = [0u8; 1024];
                        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                            match socket.read(&mut chunk).await {
                                Ok(0) | Err(_) => return,
                                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                            }
                        }
                        log.lock().push(parse_head(&buf));

                        tokio::time::sleep(delay).await;
                        let body = "upstream-ok";
                        let response = format!(
                            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
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

    (addr, received)
}

fn parse_head(buf: &[u8]) -> ReceivedRequest {
    let text = String::from_utf8_lossy(buf);
    let head = text.split("\r\n\r\n").next().unwrap_or_default();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    ReceivedRequest { request_line, headers }
}

/// The reference route table, with every upstream pointed at `upstream`.
pub fn gateway_config(upstream: SocketAddr) -> GatewayConfig {
    let uri = format!("http://{}", upstream);
    let mut config = GatewayConfig::default();
    config.auth.jwt_secret = Some(SECRET.to_string());
    config.listener.bind_address = "127.0.0.1:0".to_string();
    for route in &mut config.routes {
        route.uri = uri.clone();
    }
    config
}

/// A single catch-all route with the given filters.
pub fn single_route_config(upstream: SocketAddr, filters: Vec<FilterConfig>) -> GatewayConfig {
    let mut config = gateway_config(upstream);
    config.routes = vec![RouteConfig {
        id: "everything".to_string(),
        paths: vec!["/**".to_string()],
        uri: format!("http://{}", upstream),
        filters,
    }];
    config
}

pub fn rate_limit(rate: f64, burst: u64) -> FilterConfig {
    FilterConfig::RateLimit(RateLimitConfig {
        replenish_rate: rate,
        burst_capacity: burst,
        ..RateLimitConfig::default()
    })
}

/// Mint an HS256 token expiring `ttl_secs` from now (negative for expired).
pub fn mint_token(secret: &str, subject: &str, ttl_secs: i64) -> String {
    let exp = chrono::Utc::now().timestamp() + ttl_secs;
    encode(
        &Header::default(),
        &json!({ "sub": subject, "exp": exp }),
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub async fn body_json(body: axum::body::Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// In-memory JSON log sink.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    /// Install a JSON subscriber writing here for the current thread.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        let logs = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(logs.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (logs, guard)
    }

    /// Parsed events, in emission order.
    pub fn events(&self) -> Vec<Value> {
        let bytes = self.0.lock().clone();
        String::from_utf8_lossy(&bytes)
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }

    /// Fields of every event with the given message.
    pub fn with_message(&self, message: &str) -> Vec<Value> {
        self.events()
            .into_iter()
            .filter(|e| e["fields"]["message"] == message)
            .map(|e| e["fields"].clone())
            .collect()
    }

    pub fn contains(&self, needle: &str) -> bool {
        String::from_utf8_lossy(&self.0.lock()).contains(needle)
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

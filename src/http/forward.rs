//! Upstream forwarding.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the route's upstream base
//! - Propagate the correlation id and append `X-Forwarded-For`
//! - Enforce the upstream deadline
//! - Stream the upstream response back without buffering
//!
//! # Design Decisions
//! - No retries; a failed upstream call surfaces as a typed error
//! - Inbound `Host` is dropped so hyper derives it from the upstream URI

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, HOST};
use axum::http::{Uri, Version};
use axum::response::Response;
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::GatewayError;
use crate::http::request::{Exchange, X_REQUEST_ID};

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Terminal step of every filter chain.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, upstream: &Url, exchange: Exchange) -> Result<Response, GatewayError>;
}

/// Forwards over plain HTTP/1.1 using a pooled hyper client.
#[derive(Clone)]
pub struct HttpForwarder {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(config: &UpstreamConfig) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Join the upstream base with the inbound path and query.
///
/// A base path on the upstream is kept as a prefix:
/// `http://svc:8080/base` + `/api/x?q=1` → `http://svc:8080/base/api/x?q=1`.
/// Only the inbound query is sent; configuration rejects upstreams that carry
/// their own query or fragment.
pub fn upstream_uri(upstream: &Url, inbound: &Uri) -> Result<Uri, GatewayError> {
    let mut target = upstream.clone();
    let path = format!("{}{}", upstream.path().trim_end_matches('/'), inbound.path());
    target.set_path(&path);
    target.set_query(inbound.query());
    target.set_fragment(None);

    target
        .as_str()
        .parse::<Uri>()
        .map_err(|e| GatewayError::MalformedRequest(format!("invalid upstream uri: {}", e)))
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, upstream: &Url, exchange: Exchange) -> Result<Response, GatewayError> {
        let Exchange { request, context } = exchange;
        let (mut parts, body) = request.into_parts();

        parts.uri = upstream_uri(upstream, &parts.uri)?;
        parts.version = Version::HTTP_11;
        parts.headers.remove(HOST);

        let request_id = HeaderValue::from_str(context.request_id())
            .map_err(|e| GatewayError::MalformedRequest(format!("invalid request id: {}", e)))?;
        parts.headers.insert(X_REQUEST_ID, request_id);

        if let Some(addr) = context.remote_addr() {
            let ip = addr.ip().to_string();
            let forwarded = match parts.headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
                Some(existing) => format!("{}, {}", existing, ip),
                None => ip,
            };
            if let Ok(value) = HeaderValue::from_str(&forwarded) {
                parts.headers.insert(X_FORWARDED_FOR, value);
            }
        }

        tracing::debug!(
            request_id = %context.request_id(),
            upstream = %parts.uri,
            "Forwarding request"
        );

        let pending = self.client.request(axum::http::Request::from_parts(parts, body));
        let response: hyper::Response<Incoming> = match tokio::time::timeout(self.timeout, pending).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(request_id = %context.request_id(), error = %e, "Upstream error");
                return Err(GatewayError::Upstream(e.to_string()));
            }
            Err(_) => {
                tracing::error!(
                    request_id = %context.request_id(),
                    timeout = ?self.timeout,
                    "Upstream timed out"
                );
                return Err(GatewayError::UpstreamTimeout(self.timeout));
            }
        };

        context.commit().mark();
        let (parts, body) = response.into_parts();
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

//! Per-request state carried through the filter chain.
//!
//! # Responsibilities
//! - Pick the correlation id (client `X-Request-ID` or a fresh UUID v4)
//! - Remember the remote address, resolved route and start instant
//! - Track whether a response head has been committed
//! - Hold the rate-limit state of the request for error responses
//!
//! # Design Decisions
//! - Request ID chosen as early as possible so every log line carries it
//! - The client-supplied id is kept separately; only that one is echoed
//!   in error envelopes

use axum::body::Body;
use axum::http::{HeaderMap, Request};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::error::RateLimitHeaders;

/// Correlation header name.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Shared marker flipped once a response head has been produced.
///
/// Clones observe the same flag, so the dispatcher can see a commit made by
/// the forwarder after the exchange has been moved down the chain.
#[derive(Debug, Clone, Default)]
pub struct ResponseCommit(Arc<AtomicBool>);

impl ResponseCommit {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_committed(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Mutable per-request bag. Never shared across requests.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    client_request_id: Option<String>,
    remote_addr: Option<SocketAddr>,
    route_id: Option<String>,
    started_at: Instant,
    commit: ResponseCommit,
    rate_limit: Arc<Mutex<Option<RateLimitHeaders>>>,
}

impl RequestContext {
    /// Build the context for an inbound request.
    pub fn new(headers: &HeaderMap, remote_addr: Option<SocketAddr>) -> Self {
        let client_request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let request_id = client_request_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request_id,
            client_request_id,
            remote_addr,
            route_id: None,
            started_at: Instant::now(),
            commit: ResponseCommit::default(),
            rate_limit: Arc::default(),
        }
    }

    /// Correlation id for logging, supplied or generated.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// The id the client sent, if any.
    pub fn client_request_id(&self) -> Option<&str> {
        self.client_request_id.as_deref()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn route_id(&self) -> Option<&str> {
        self.route_id.as_deref()
    }

    pub(crate) fn set_route_id(&mut self, id: &str) {
        self.route_id = Some(id.to_string());
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn commit(&self) -> &ResponseCommit {
        &self.commit
    }

    /// Remember the bucket state once a rate limiter has run. Shared by clones.
    pub fn record_rate_limit(&self, limits: RateLimitHeaders) {
        *self.rate_limit.lock() = Some(limits);
    }

    pub fn rate_limit(&self) -> Option<RateLimitHeaders> {
        *self.rate_limit.lock()
    }
}

/// A request travelling down the filter chain together with its context.
#[derive(Debug)]
pub struct Exchange {
    pub request: Request<Body>,
    pub context: RequestContext,
}

impl Exchange {
    pub fn new(request: Request<Body>, context: RequestContext) -> Self {
        Self { request, context }
    }

    pub fn path(&self) -> &str {
        self.request.uri().path()
    }
}

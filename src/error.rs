//! Request-path error taxonomy.
//!
//! Every failure raised while resolving a route, running a filter or forwarding
//! to an upstream is one of these variants. The error translator matches on
//! them exhaustively to pick the status code and client-visible message.

use axum::http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Rate-limit parameters echoed back to the client as `X-RateLimit-*` headers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitHeaders {
    pub remaining: u64,
    pub replenish_rate: f64,
    pub burst_capacity: u64,
    pub requested_tokens: u64,
}

/// Errors produced by the dispatch pipeline.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No configured route matches the request path.
    #[error("no route matches path {path}")]
    RouteNotFound { path: String },

    /// The authentication filter rejected the request.
    #[error("authentication rejected: {message}")]
    AuthenticationRejected { status: StatusCode, message: String },

    /// The client's token bucket is empty.
    #[error("rate limit exceeded for key {key}")]
    RateLimitExceeded { key: String, limits: RateLimitHeaders },

    /// The request could not be turned into a valid upstream request.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The upstream call failed before a response head arrived.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The upstream did not answer within the configured deadline.
    #[error("upstream request timed out after {0:?}")]
    UpstreamTimeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Status code and client-visible message for this error.
    ///
    /// Classification order: not found, status-carrying rejections, malformed
    /// input, then everything else as an internal error.
    pub fn classify(&self) -> (StatusCode, String) {
        match self {
            GatewayError::RouteNotFound { .. } => {
                (StatusCode::NOT_FOUND, "Service not found".to_string())
            }
            GatewayError::AuthenticationRejected { status, message } => (*status, message.clone()),
            GatewayError::RateLimitExceeded { .. } => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string())
            }
            GatewayError::MalformedRequest(_) => {
                (StatusCode::BAD_REQUEST, "Invalid request parameters".to_string())
            }
            GatewayError::Upstream(_)
            | GatewayError::UpstreamTimeout(_)
            | GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }

    /// Status code the translator will emit for this error.
    pub fn status(&self) -> StatusCode {
        self.classify().0
    }

    /// Short label used for the rejection metric.
    pub fn reason(&self) -> &'static str {
        match self {
            GatewayError::RouteNotFound { .. } => "route_not_found",
            GatewayError::AuthenticationRejected { .. } => "authentication",
            GatewayError::RateLimitExceeded { .. } => "rate_limit",
            GatewayError::MalformedRequest(_) => "malformed_request",
            GatewayError::Upstream(_) => "upstream",
            GatewayError::UpstreamTimeout(_) => "upstream_timeout",
            GatewayError::Internal(_) => "internal",
        }
    }
}

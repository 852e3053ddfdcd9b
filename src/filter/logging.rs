//! Request/response logging filter.
//!
//! Logs one line when a request enters the chain and one when it leaves,
//! both keyed by the same correlation id.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::Response;
use chrono::Local;
use std::time::Instant;

use crate::error::GatewayError;
use crate::filter::{Filter, FilterKind, Next};
use crate::http::request::Exchange;
use crate::observability::metrics;

/// Outermost filter. Never rejects.
#[derive(Debug, Clone, Default)]
pub struct LoggingFilter;

impl LoggingFilter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Filter for LoggingFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Logging
    }

    async fn apply(&self, exchange: Exchange, next: Next<'_>) -> Result<Response, GatewayError> {
        let ctx = &exchange.context;
        let remote = ctx
            .remote_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        tracing::info!(
            request_id = %ctx.request_id(),
            method = %exchange.request.method(),
            uri = %exchange.request.uri(),
            remote = %remote,
            timestamp = %Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.3f"),
            "Gateway request"
        );

        let hook = Completion {
            request_id: ctx.request_id().to_string(),
            route: ctx.route_id().unwrap_or("none").to_string(),
            method: exchange.request.method().to_string(),
            started_at: Instant::now(),
            done: false,
        };

        let result = next.run(exchange).await;

        let status = match &result {
            Ok(response) => response.status(),
            Err(err) => err.status(),
        };
        hook.complete(status);

        result
    }
}

/// Records the response line exactly once.
///
/// If the request future is dropped before the chain finishes (client went
/// away), the drop records a cancelled entry instead.
struct Completion {
    request_id: String,
    route: String,
    method: String,
    started_at: Instant,
    done: bool,
}

impl Completion {
    fn complete(mut self, status: StatusCode) {
        self.done = true;
        let duration_ms = self.started_at.elapsed().as_millis() as u64;

        tracing::info!(
            request_id = %self.request_id,
            status = status.as_u16(),
            duration_ms,
            "Gateway response"
        );
        metrics::record_request(&self.route, &self.method, status.as_u16(), self.started_at);
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if !self.done {
            tracing::info!(
                request_id = %self.request_id,
                duration_ms = self.started_at.elapsed().as_millis() as u64,
                "Gateway request cancelled"
            );
        }
    }
}

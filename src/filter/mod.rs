//! Filter chain subsystem.
//!
//! # Data Flow
//! ```text
//! Route's FilterChain (built once at startup)
//!     → logging.rs        (always outermost, never rejects)
//!     → rate_limit        (optional, may reject with 429)
//!     → auth              (optional, may reject with 401)
//!     → Forwarder         (terminal step, only after every filter continued)
//! ```
//!
//! # Design Decisions
//! - Execution order is fixed by `FilterKind`, not by configuration order
//! - `Next` is consumed by value, so a filter can continue at most once
//! - Filters return typed `GatewayError`s; the chain never reinterprets them

pub mod logging;

use async_trait::async_trait;
use axum::response::Response;
use std::fmt;
use std::sync::Arc;
use url::Url;

use crate::error::GatewayError;
use crate::http::forward::Forwarder;
use crate::http::request::Exchange;

pub use logging::LoggingFilter;

/// Filter kinds in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKind {
    Logging,
    RateLimit,
    Authentication,
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FilterKind::Logging => "logging",
            FilterKind::RateLimit => "rate_limit",
            FilterKind::Authentication => "authentication",
        };
        f.write_str(name)
    }
}

/// A unit of the chain of responsibility.
///
/// A filter either continues by calling `next.run(exchange)` or short-circuits
/// by returning an error without calling it.
#[async_trait]
pub trait Filter: Send + Sync + fmt::Debug {
    fn kind(&self) -> FilterKind;

    async fn apply(&self, exchange: Exchange, next: Next<'_>) -> Result<Response, GatewayError>;
}

/// The remainder of a chain, ending in the forwarding step.
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Filter>],
    upstream: &'a Url,
    forwarder: &'a dyn Forwarder,
}

impl<'a> Next<'a> {
    /// Run the rest of the chain.
    pub async fn run(self, exchange: Exchange) -> Result<Response, GatewayError> {
        match self.remaining.split_first() {
            Some((filter, rest)) => {
                let next = Next {
                    remaining: rest,
                    upstream: self.upstream,
                    forwarder: self.forwarder,
                };
                filter.apply(exchange, next).await
            }
            None => self.forwarder.forward(self.upstream, exchange).await,
        }
    }
}

/// Ordered filters for one route.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    /// Build a chain, putting filters into canonical execution order.
    /// The sort is stable, so filters of the same kind keep their relative order.
    pub fn new(mut filters: Vec<Arc<dyn Filter>>) -> Self {
        filters.sort_by_key(|f| f.kind());
        Self { filters }
    }

    /// Kinds in the order they will execute.
    pub fn kinds(&self) -> Vec<FilterKind> {
        self.filters.iter().map(|f| f.kind()).collect()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Run every filter in order, then forward to `upstream`.
    pub async fn execute(
        &self,
        upstream: &Url,
        exchange: Exchange,
        forwarder: &dyn Forwarder,
    ) -> Result<Response, GatewayError> {
        Next {
            remaining: &self.filters,
            upstream,
            forwarder,
        }
        .run(exchange)
        .await
    }
}

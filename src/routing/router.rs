//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Compile route configs into matchers, upstream URLs and filter chains
//! - Look up the first route matching a request path
//! - Return the matched route or an explicit not-found error
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in declaration order (acceptable for typical route counts)
//! - Every chain gets a logging filter, configured or not
//! - One JWT filter instance is shared by every route that authenticates

use axum::response::Response;
use std::sync::Arc;
use url::Url;

use crate::config::validation::{validate_config, ValidationError};
use crate::config::{ConfigError, FilterConfig, GatewayConfig, RouteConfig};
use crate::error::GatewayError;
use crate::filter::{Filter, FilterChain, FilterKind, LoggingFilter};
use crate::http::forward::Forwarder;
use crate::http::request::Exchange;
use crate::routing::matcher::{AnyMatcher, Matcher, PathPattern};
use crate::security::auth::JwtAuthFilter;
use crate::security::rate_limit::{RateLimitFilter, TokenBucketLimiter};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub id: String,
    pub matcher: AnyMatcher,
    pub upstream: Url,
    pub chain: FilterChain,
}

impl Route {
    /// Run this route's filter chain, forwarding on success.
    pub async fn execute(
        &self,
        exchange: Exchange,
        forwarder: &dyn Forwarder,
    ) -> Result<Response, GatewayError> {
        self.chain.execute(&self.upstream, exchange, forwarder).await
    }
}

/// Ordered, immutable set of routes.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    rate_limiters: Vec<Arc<TokenBucketLimiter>>,
}

impl RouteTable {
    /// Validate the configuration and compile every route.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        // Validation guarantees a secret whenever a route authenticates
        let auth: Option<Arc<JwtAuthFilter>> = config
            .auth
            .jwt_secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|secret| Arc::new(JwtAuthFilter::new(secret, &config.auth)));

        let mut table = RouteTable::default();
        for route_config in &config.routes {
            let route = table.compile(route_config, auth.as_ref())?;
            tracing::info!(
                route = %route.id,
                upstream = %route.upstream,
                filters = ?route.chain.kinds(),
                "Route registered"
            );
            table.routes.push(route);
        }
        Ok(table)
    }

    fn compile(
        &mut self,
        config: &RouteConfig,
        auth: Option<&Arc<JwtAuthFilter>>,
    ) -> Result<Route, ConfigError> {
        let upstream = Url::parse(&config.uri).map_err(|e| {
            ConfigError::Validation(vec![ValidationError::new(
                format!("routes.{}.uri", config.id),
                e.to_string(),
            )])
        })?;

        let mut filters: Vec<Arc<dyn Filter>> = Vec::with_capacity(config.filters.len() + 1);
        for filter in &config.filters {
            match filter {
                FilterConfig::Logging => filters.push(Arc::new(LoggingFilter::new())),
                FilterConfig::RateLimit(rl) => {
                    let filter = RateLimitFilter::from_config(rl);
                    self.rate_limiters.push(filter.limiter().clone());
                    filters.push(Arc::new(filter));
                }
                FilterConfig::Authentication => {
                    let auth = auth.ok_or_else(|| {
                        ConfigError::Validation(vec![ValidationError::new(
                            "auth.jwt_secret",
                            "required by the authentication filter",
                        )])
                    })?;
                    filters.push(auth.clone());
                }
            }
        }
        if !filters.iter().any(|f| f.kind() == FilterKind::Logging) {
            filters.push(Arc::new(LoggingFilter::new()));
        }

        Ok(Route {
            id: config.id.clone(),
            matcher: AnyMatcher::new(config.paths.iter().map(|p| PathPattern::parse(p)).collect()),
            upstream,
            chain: FilterChain::new(filters),
        })
    }

    /// Build a table from already compiled routes.
    pub fn from_routes(routes: Vec<Route>) -> Self {
        Self {
            routes,
            rate_limiters: Vec::new(),
        }
    }

    /// First route, in declaration order, whose patterns match `path`.
    pub fn resolve(&self, path: &str) -> Result<&Route, GatewayError> {
        self.routes
            .iter()
            .find(|r| r.matcher.matches(path))
            .ok_or_else(|| GatewayError::RouteNotFound {
                path: path.to_string(),
            })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Limiters of every rate-limited route, for the eviction sweeper.
    pub fn rate_limiters(&self) -> &[Arc<TokenBucketLimiter>] {
        &self.rate_limiters
    }
}

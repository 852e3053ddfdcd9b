//! Request dispatch: route lookup, filter chain, error translation.

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::response::Response;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::http::forward::{Forwarder, HttpForwarder};
use crate::http::request::{Exchange, RequestContext, X_REQUEST_ID};
use crate::http::response::ErrorTranslator;
use crate::observability::metrics;
use crate::routing::RouteTable;

/// Entry point for every proxied request.
pub struct Dispatcher {
    routes: RouteTable,
    forwarder: Arc<dyn Forwarder>,
    translator: ErrorTranslator,
}

impl Dispatcher {
    pub fn new(routes: RouteTable, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            routes,
            forwarder,
            translator: ErrorTranslator::new(),
        }
    }

    /// Compile the route table and use the HTTP forwarder.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let routes = RouteTable::from_config(config)?;
        Ok(Self::new(routes, Arc::new(HttpForwarder::new(&config.upstream))))
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Handle one request end to end.
    ///
    /// Returns `Err` only when a response was already committed and the
    /// error could not be answered with an error response.
    pub async fn dispatch(
        &self,
        request: Request<Body>,
        remote_addr: Option<SocketAddr>,
    ) -> Result<Response, GatewayError> {
        let mut ctx = RequestContext::new(request.headers(), remote_addr);
        let path = request.uri().path().to_string();

        let route = match self.routes.resolve(&path) {
            Ok(route) => route,
            Err(err) => {
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    method = %request.method(),
                    path = %path,
                    "No route matched"
                );
                metrics::record_request("none", request.method().as_str(), 404, ctx.started_at());
                metrics::record_rejection(err.reason());
                return self.finish(self.translator.handle(err, &path, &ctx), &ctx);
            }
        };

        ctx.set_route_id(&route.id);
        let exchange = Exchange::new(request, ctx.clone());

        let result = match route.execute(exchange, self.forwarder.as_ref()).await {
            Ok(response) => Ok(response),
            Err(err) => {
                metrics::record_rejection(err.reason());
                self.translator.handle(err, &path, &ctx)
            }
        };
        self.finish(result, &ctx)
    }

    fn finish(
        &self,
        result: Result<Response, GatewayError>,
        ctx: &RequestContext,
    ) -> Result<Response, GatewayError> {
        let mut response = result?;
        if !response.headers().contains_key(X_REQUEST_ID) {
            if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
                response.headers_mut().insert(X_REQUEST_ID, value);
            }
        }
        Ok(response)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.routes().len())
            .finish_non_exhaustive()
    }
}

//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: management endpoints plus a catch-all proxy
//!   handler
//! - Wire up the trace layer
//! - Bind the server to a listener and drain on shutdown
//! - Run the rate-limiter eviction sweeper alongside the server

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::config::{ConfigError, GatewayConfig};
use crate::error::GatewayError;
use crate::http::dispatch::Dispatcher;
use crate::lifecycle::{shutdown, Shutdown};
use crate::management::setup_management_router;
use crate::security::rate_limit::run_eviction;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    dispatcher: Arc<Dispatcher>,
}

impl GatewayServer {
    /// Compile the route table and build the server.
    pub fn new(config: &GatewayConfig) -> Result<Self, ConfigError> {
        let dispatcher = Dispatcher::from_config(config)?;
        Ok(Self::with_dispatcher(dispatcher, config.management.enabled))
    }

    /// Build the server around an existing dispatcher.
    pub fn with_dispatcher(dispatcher: Dispatcher, management: bool) -> Self {
        let dispatcher = Arc::new(dispatcher);
        let state = AppState {
            dispatcher: dispatcher.clone(),
        };
        let router = Self::build_router(state, management);
        Self { router, dispatcher }
    }

    fn build_router(state: AppState, management: bool) -> Router {
        let router = if management {
            setup_management_router()
        } else {
            Router::new()
        };

        router
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The assembled router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.dispatcher.routes().routes().len(),
            "HTTP server starting"
        );

        let limiters: Vec<_> = self
            .dispatcher
            .routes()
            .rate_limiters()
            .iter()
            .filter(|l| l.idle_ttl().is_some())
            .cloned()
            .collect();
        if !limiters.is_empty() {
            tokio::spawn(run_eviction(limiters, shutdown.subscribe()));
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::wait_for(shutdown.subscribe()))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Catch-all handler: everything that is not a management endpoint.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let remote_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    match state.dispatcher.dispatch(request, remote_addr).await {
        Ok(response) => response,
        Err(err) => aborted(err),
    }
}

/// A response whose body fails immediately, so hyper tears the connection
/// down instead of completing a second response.
fn aborted(err: GatewayError) -> Response {
    let body = Body::from_stream(futures_util::stream::once(async move {
        Err::<Bytes, GatewayError>(err)
    }));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
}

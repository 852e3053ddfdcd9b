//! API gateway library.
//!
//! Routes inbound HTTP requests by path to upstream services through a
//! per-route filter chain (logging, rate limiting, JWT authentication) and
//! answers every gateway-side failure with a uniform JSON error envelope.

pub mod config;
pub mod error;
pub mod filter;
pub mod http;
pub mod lifecycle;
pub mod management;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;

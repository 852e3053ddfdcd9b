//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, management endpoints, catch-all handler)
//!     → dispatch.rs (correlation id, route lookup, filter chain)
//!     → forward.rs (rewrite URI, call upstream, stream response)
//!     → response.rs (error envelope when the chain short-circuits)
//!     → Send to client
//! ```

pub mod dispatch;
pub mod forward;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::Dispatcher;
pub use forward::{Forwarder, HttpForwarder};
pub use request::{Exchange, RequestContext, X_REQUEST_ID};
pub use response::{ErrorEnvelope, ErrorTranslator};
pub use server::GatewayServer;

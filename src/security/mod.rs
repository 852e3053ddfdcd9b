//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Route's filter chain:
//!     → rate_limit.rs (per-key token buckets, 429 on exhaustion)
//!     → auth.rs (bearer JWT, 401 on failure)
//!     → forward
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - Rate limiting runs before authentication so floods never reach
//!   signature verification
//! - Tokens never appear in log output

pub mod auth;
pub mod rate_limit;

pub use auth::{AuthContext, AuthOutcome, JwtAuthFilter};
pub use rate_limit::{RateLimitFilter, TokenBucketLimiter};

//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (route lookup in declaration order)
//!     → matcher.rs (evaluate path patterns)
//!     → Return: matched Route or RouteNotFound
//!
//! Route Compilation (at startup):
//!     RouteConfig[]
//!     → Compile path patterns
//!     → Build filter chains in canonical order
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (declaration order)

pub mod matcher;
pub mod router;

pub use router::{Route, RouteTable};

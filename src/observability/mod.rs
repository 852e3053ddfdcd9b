//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Filters and dispatcher produce:
//!     → logging.rs (structured log events keyed by request_id)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every request-path log line
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rejections_total` (counter): short-circuited requests by reason
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no setup
//! - The Prometheus exporter runs its own HTTP listener

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and start its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    describe_counter!("gateway_requests_total", "Requests handled by the gateway");
    describe_histogram!(
        "gateway_request_duration_seconds",
        "Time from entering the filter chain to completion"
    );
    describe_counter!(
        "gateway_rejections_total",
        "Requests answered by the gateway without a successful upstream response"
    );

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one completed request.
pub fn record_request(route: &str, method: &str, status: u16, started_at: Instant) {
    counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(started_at.elapsed().as_secs_f64());
}

/// Record a request answered with an error.
pub fn record_rejection(reason: &'static str) {
    counter!("gateway_rejections_total", "reason" => reason).increment(1);
}

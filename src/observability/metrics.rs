//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (admissions, rejections, drain behavior)
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `quiesce_requests_admitted_total` (counter): requests let past the gate
//! - `quiesce_requests_rejected_total` (counter): requests refused after
//!   shutdown began
//! - `quiesce_active_requests` (gauge): current in-flight count
//! - `quiesce_drain_duration_seconds` (histogram): how long the drain took
//! - `quiesce_drain_outcomes_total` (counter): drain results by outcome label
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - The gauge is set to the absolute in-flight count on every update, so a
//!   missed event cannot skew it forever
//! - Recording macros are no-ops until an exporter is installed, so the
//!   endpoint can be disabled in config without touching call sites

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter and register metric descriptions.
pub fn init_metrics(address: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()?;

    describe_counter!(
        "quiesce_requests_admitted_total",
        "Requests admitted past the shutdown gate"
    );
    describe_counter!(
        "quiesce_requests_rejected_total",
        "Requests refused because shutdown had begun"
    );
    describe_gauge!("quiesce_active_requests", "Requests currently in flight");
    describe_histogram!(
        "quiesce_drain_duration_seconds",
        "Time spent waiting for in-flight requests during shutdown"
    );
    describe_counter!(
        "quiesce_drain_outcomes_total",
        "Drain attempts by outcome (drained or timed_out)"
    );

    tracing::info!(addr = %address, "Metrics endpoint listening");
    Ok(())
}

pub fn record_admitted(active: i64) {
    counter!("quiesce_requests_admitted_total").increment(1);
    gauge!("quiesce_active_requests").set(active as f64);
}

pub fn record_rejected() {
    counter!("quiesce_requests_rejected_total").increment(1);
}

pub fn record_completed(active: i64) {
    gauge!("quiesce_active_requests").set(active as f64);
}

pub fn record_drain(drained: bool, elapsed: Duration) {
    histogram!("quiesce_drain_duration_seconds").record(elapsed.as_secs_f64());
    let outcome = if drained { "drained" } else { "timed_out" };
    counter!("quiesce_drain_outcomes_total", "outcome" => outcome).increment(1);
}

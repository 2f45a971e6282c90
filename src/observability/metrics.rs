//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_active_connections` (gauge): currently open WebSocket connections
//! - `gateway_frames_total` (counter): frames by `direction` (inbound, outbound)
//! - `gateway_send_failures_total` (counter): `send` calls that found no open connection
//! - `gateway_http_requests_total` (counter): HTTP exchanges by `status`
//! - `gateway_http_duration_seconds` (histogram): time spent producing a reply
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    describe();
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

fn describe() {
    describe_gauge!("gateway_active_connections", Unit::Count, "Open WebSocket connections");
    describe_counter!("gateway_frames_total", Unit::Count, "WebSocket frames by direction");
    describe_counter!(
        "gateway_send_failures_total",
        Unit::Count,
        "Sends addressed to unknown or closed connections"
    );
    describe_counter!("gateway_http_requests_total", Unit::Count, "HTTP exchanges by status");
    describe_histogram!(
        "gateway_http_duration_seconds",
        Unit::Seconds,
        "Time to produce an HTTP reply"
    );
}

pub fn record_connections(count: usize) {
    gauge!("gateway_active_connections").set(count as f64);
}

pub fn record_frame(direction: &'static str) {
    counter!("gateway_frames_total", "direction" => direction).increment(1);
}

pub fn record_send_failure() {
    counter!("gateway_send_failures_total").increment(1);
}

pub fn record_http(status: u16, start_time: Instant) {
    counter!("gateway_http_requests_total", "status" => status.to_string()).increment(1);
    histogram!("gateway_http_duration_seconds").record(start_time.elapsed().as_secs_f64());
}

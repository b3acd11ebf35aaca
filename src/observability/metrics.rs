//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): forwarded HTTP requests by method, status
//! - `proxy_ws_sessions` (gauge): live WebSocket relay sessions
//! - `proxy_ws_frames_total` (counter): relayed frames by direction

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on the given address.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "metrics exporter listening"),
        Err(err) => tracing::error!(error = %err, "failed to install metrics exporter"),
    }
}

/// Record one forwarded HTTP request.
pub fn record_forward(method: &str, status: u16) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// A WebSocket relay session started.
pub fn record_session_opened() {
    gauge!("proxy_ws_sessions").increment(1.0);
}

/// A WebSocket relay session terminated.
pub fn record_session_closed() {
    gauge!("proxy_ws_sessions").decrement(1.0);
}

/// One frame relayed in the given direction.
pub fn record_frame(direction: &'static str) {
    counter!("proxy_ws_frames_total", "direction" => direction).increment(1);
}

//! Prometheus metrics for monitoring room health and move throughput.
//!
//! Metrics are exposed in Prometheus text format by the exporter's own HTTP
//! listener, separate from the API bind address.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use durak_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::move_accepted("place");
//! metrics::websocket_connections_active(10);
//! ```

use durak::RoomError;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// Move Metrics
// ============================================================================

/// Increment accepted moves counter.
pub fn move_accepted(kind: &str) {
    metrics::counter!("moves_accepted_total",
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Increment failed moves counter, labelled by move and error kind.
pub fn move_failed(kind: &str, error: &RoomError) {
    metrics::counter!("moves_failed_total",
        "kind" => kind.to_string(),
        "error" => error.kind()
    )
    .increment(1);

    if matches!(error, RoomError::Busy(_)) {
        metrics::counter!("room_busy_total").increment(1);
    }
}

// ============================================================================
// Room Metrics
// ============================================================================

/// Set current loaded rooms count.
pub fn active_rooms(count: usize) {
    metrics::gauge!("active_rooms").set(count as f64);
}

/// Increment rooms started counter.
pub fn rooms_started_total() {
    metrics::counter!("rooms_started_total").increment(1);
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

/// Set current active WebSocket connections count.
pub fn websocket_connections_active(count: u64) {
    metrics::gauge!("websocket_connections_active").set(count as f64);
}

/// Increment total WebSocket connections counter.
pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

/// Increment WebSocket messages sent counter.
pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

/// Increment WebSocket messages received counter.
pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

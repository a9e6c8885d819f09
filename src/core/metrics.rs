// src/core/metrics.rs

//! Defines and registers Prometheus metrics for relay monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{
    Counter, Gauge, Histogram, TextEncoder, register_counter, register_gauge, register_histogram,
};

lazy_static! {
    // --- Server-wide Gauges ---
    /// The number of connections currently in the registry.
    pub static ref CONNECTED_CLIENTS: Gauge =
        register_gauge!("linerelay_connected_clients", "Number of currently connected clients.").unwrap();
    /// The number of messages waiting for the distributor.
    pub static ref QUEUE_DEPTH: Gauge =
        register_gauge!("linerelay_queue_depth", "Number of messages waiting to be broadcast.").unwrap();

    // --- Server-wide Counters ---
    /// The total number of connections accepted by the server since startup.
    pub static ref CONNECTIONS_RECEIVED_TOTAL: Counter =
        register_counter!("linerelay_connections_received_total", "Total number of connections received.").unwrap();
    /// Connections closed right after accept because `max_clients` was reached.
    pub static ref CONNECTIONS_REJECTED_TOTAL: Counter =
        register_counter!("linerelay_connections_rejected_total", "Total number of connections rejected at the client limit.").unwrap();
    /// The total number of lines read from clients.
    pub static ref MESSAGES_RECEIVED_TOTAL: Counter =
        register_counter!("linerelay_messages_received_total", "Total number of lines received from clients.").unwrap();
    /// The total number of lines discarded by the queue overflow policy.
    pub static ref MESSAGES_DROPPED_TOTAL: Counter =
        register_counter!("linerelay_messages_dropped_total", "Total number of lines dropped by the queue overflow policy.").unwrap();
    /// The total number of broadcast passes.
    pub static ref BROADCASTS_TOTAL: Counter =
        register_counter!("linerelay_broadcasts_total", "Total number of messages broadcast.").unwrap();
    /// The total number of successful per-connection writes.
    pub static ref DELIVERIES_TOTAL: Counter =
        register_counter!("linerelay_deliveries_total", "Total number of lines written to clients.").unwrap();
    /// The total number of per-connection writes that failed or timed out.
    pub static ref WRITE_FAILURES_TOTAL: Counter =
        register_counter!("linerelay_write_failures_total", "Total number of failed or timed out writes.").unwrap();

    // --- Histograms ---
    /// Time spent writing one message to every connection in a snapshot.
    pub static ref BROADCAST_LATENCY_SECONDS: Histogram =
        register_histogram!("linerelay_broadcast_latency_seconds", "Latency of a full broadcast pass in seconds.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_else(|e| format!("# failed to encode metrics: {e}\n"))
}

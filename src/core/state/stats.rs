// src/core/state/stats.rs

//! Contains state definitions and logic for server statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds all state and logic related to server-wide statistics and monitoring.
#[derive(Debug)]
pub struct StatsState {
    /// The total number of connections accepted by the server since startup.
    total_connections: AtomicU64,
    /// Connections closed right after accept because of the client limit.
    rejected_connections: AtomicU64,
    /// The total number of lines read from clients since startup.
    total_messages: AtomicU64,
    /// The total number of lines written to clients since startup.
    total_deliveries: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    /// Creates a new `StatsState` with initialized counters.
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            rejected_connections: AtomicU64::new(0),
            total_messages: AtomicU64::new(0),
            total_deliveries: AtomicU64::new(0),
        }
    }

    /// Atomically increments the total number of connections received.
    pub fn increment_total_connections(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of connections received.
    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn increment_rejected_connections(&self) {
        self.rejected_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_rejected_connections(&self) -> u64 {
        self.rejected_connections.load(Ordering::Relaxed)
    }

    /// Atomically increments the total number of lines received.
    pub fn increment_total_messages(&self) {
        self.total_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Gets the total number of lines received.
    pub fn get_total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }

    pub fn add_deliveries(&self, count: u64) {
        self.total_deliveries.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_total_deliveries(&self) -> u64 {
        self.total_deliveries.load(Ordering::Relaxed)
    }
}

// src/core/distributor.rs

//! The single task that turns queued messages into outbound writes.

use crate::core::metrics;
use crate::core::state::ServerState;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// The result of writing one message to one registry snapshot.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections that received the message.
    pub delivered: usize,
    /// Ids of connections whose write failed and which were deregistered.
    pub failed: Vec<u64>,
}

/// Pops messages off the queue and writes each to every registered connection.
pub struct MessageDistributor {
    state: Arc<ServerState>,
}

impl MessageDistributor {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// Runs until the queue is closed or the shutdown signal fires.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Message distributor started.");
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Message distributor shutting down.");
                    return;
                }
                message = self.state.queue.dequeue() => {
                    let Some(message) = message else {
                        info!("Message queue closed; distributor exiting.");
                        return;
                    };
                    self.broadcast(&message).await;
                }
            }
        }
    }

    /// Writes `message` to every connection in a fresh registry snapshot.
    ///
    /// Members already closed by their collector are skipped; they are on
    /// their way out of the registry and are not counted as failures.
    /// Writes run concurrently, each bounded by the configured write timeout.
    /// A connection whose write fails is closed and deregistered; the rest of
    /// the snapshot is unaffected. The pass completes before the next message
    /// is taken, which keeps per-connection order intact.
    pub async fn broadcast(&self, message: &str) -> BroadcastReport {
        let started = Instant::now();
        let snapshot: Vec<_> = self
            .state
            .registry
            .snapshot()
            .into_iter()
            .filter(|conn| !conn.is_closed())
            .collect();
        let timeout = self.state.config.write_timeout;

        let results = futures::future::join_all(snapshot.iter().map(|conn| async move {
            let result = conn.send_line(message, timeout).await;
            (conn, result)
        }))
        .await;

        let mut report = BroadcastReport::default();
        for (conn, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    if e.is_normal_disconnect() {
                        debug!("Dropping {} after failed write: {}", conn.addr(), e);
                    } else {
                        warn!("Dropping {} after failed write: {}", conn.addr(), e);
                    }
                    conn.mark_closed();
                    self.state.registry.remove(conn.id());
                    report.failed.push(conn.id());
                }
            }
        }

        metrics::BROADCASTS_TOTAL.inc();
        metrics::DELIVERIES_TOTAL.inc_by(report.delivered as f64);
        metrics::WRITE_FAILURES_TOTAL.inc_by(report.failed.len() as f64);
        metrics::BROADCAST_LATENCY_SECONDS.observe(started.elapsed().as_secs_f64());
        self.state.stats.add_deliveries(report.delivered as u64);
        debug!(
            "Broadcast to {} connections ({} failed) in {:?}.",
            snapshot.len(),
            report.failed.len(),
            started.elapsed()
        );
        report
    }
}

// src/server/spawner.rs

//! Spawns the server's long-running background tasks.

use super::context::ServerContext;
use super::metrics_server;
use crate::core::MessageDistributor;
use tracing::info;

/// Spawns the distributor and, if enabled, the metrics exporter into the
/// context's JoinSet.
pub fn spawn_all(ctx: &mut ServerContext) {
    let server_state = &ctx.state;
    let shutdown_tx = &ctx.shutdown_tx;
    let background_tasks = &mut ctx.background_tasks;

    // --- Broadcast Pipeline ---
    let distributor = MessageDistributor::new(server_state.clone());
    let shutdown_rx_distributor = shutdown_tx.subscribe();
    background_tasks.spawn(async move {
        distributor.run(shutdown_rx_distributor).await;
        Ok(())
    });

    // --- Metrics Server ---
    if server_state.config.metrics.enabled {
        let metrics_state = server_state.clone();
        let shutdown_rx_metrics = shutdown_tx.subscribe();
        background_tasks.spawn(metrics_server::run_metrics_server(
            metrics_state,
            shutdown_rx_metrics,
        ));
    } else {
        info!("Prometheus metrics server is disabled in the configuration.");
    }

    info!("All background tasks have been spawned.");
}

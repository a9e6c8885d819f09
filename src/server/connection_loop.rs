// src/server/connection_loop.rs

//! Contains the acceptor loop for incoming connections and the graceful
//! shutdown sequence that follows it.

use super::context::ServerContext;
use crate::connection::MessageCollector;
use crate::core::metrics;
use crate::core::state::ServerState;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// How long shutdown waits for collectors and background tasks to finish.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not
/// spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Accepts connections until `shutdown` resolves or a background task fails,
/// then shuts everything down.
pub async fn run<F>(ctx: ServerContext, shutdown: F)
where
    F: Future<Output = ()>,
{
    let ServerContext {
        state,
        listener,
        shutdown_tx,
        mut background_tasks,
    } = ctx;
    let mut client_tasks = JoinSet::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                info!("Shutdown requested, stopping the acceptor.");
                break;
            }

            Some(res) = background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {:#}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = listener.accept() => {
                match res {
                    Ok((socket, addr)) => {
                        accept_connection(&state, &shutdown_tx, &mut client_tasks, socket, addr);
                    }
                    // Transient (e.g. out of file descriptors); the listener itself is still fine.
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                }
            },

            Some(res) = client_tasks.join_next() => {
                if let Err(e) = res
                    && e.is_panic()
                {
                    error!("A message collector panicked: {e:?}");
                }
            },
        }
    }

    drop(listener);
    info!("Shutting down. Sending signal to all tasks.");
    if shutdown_tx.send(()).is_err() {
        debug!("No task was subscribed to the shutdown signal.");
    }
    state.queue.close();

    if tokio::time::timeout(SHUTDOWN_GRACE, async {
        while client_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for collectors; aborting the rest.");
        client_tasks.shutdown().await;
    }
    state.registry.close_all().await;
    info!("All client connections closed.");

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(SHUTDOWN_GRACE, async {
        while background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
        background_tasks.shutdown().await;
    };

    info!(
        "Server shutdown complete. Connections: {} accepted, {} rejected. Messages: {} received, {} deliveries.",
        state.stats.get_total_connections(),
        state.stats.get_rejected_connections(),
        state.stats.get_total_messages(),
        state.stats.get_total_deliveries()
    );
}

/// Registers an accepted socket and spawns its collector.
fn accept_connection(
    state: &Arc<ServerState>,
    shutdown_tx: &broadcast::Sender<()>,
    client_tasks: &mut JoinSet<()>,
    socket: TcpStream,
    addr: SocketAddr,
) {
    state.stats.increment_total_connections();
    metrics::CONNECTIONS_RECEIVED_TOTAL.inc();

    if state.registry.len() >= state.config.max_clients {
        warn!(
            "Rejecting connection from {}: max_clients ({}) reached.",
            addr, state.config.max_clients
        );
        state.stats.increment_rejected_connections();
        metrics::CONNECTIONS_REJECTED_TOTAL.inc();
        return;
    }

    if let Err(e) = socket.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }
    let (reader, writer) = socket.into_split();
    let collector = MessageCollector::attach(state, addr, reader, writer, shutdown_tx.subscribe());
    info!(
        "Accepted new connection from {} (session {}).",
        addr,
        collector.connection().id()
    );

    client_tasks.spawn(async move {
        if let Err(e) = collector.run().await {
            warn!("Connection from {} terminated unexpectedly: {}", addr, e);
        }
    });
}

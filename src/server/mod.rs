// src/server/mod.rs

use crate::config::Config;
use crate::core::state::LogReloadHandle;
use anyhow::{Result, anyhow};
use std::future::Future;
use tokio::signal::unix::{SignalKind, signal};
use tracing::info;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod spawner;

pub use context::ServerContext;
pub use initialization::setup;

/// The main server startup function: binds, serves, and returns once a
/// SIGINT or SIGTERM has been handled.
pub async fn run(config: Config, log_reload_handle: LogReloadHandle) -> Result<()> {
    // 1. Initialize server state and the listener. A bind failure ends here.
    let server_context = initialization::setup(config, log_reload_handle).await?;

    // 2. Serve until a termination signal arrives.
    let signals = shutdown_signal()?;
    serve(server_context, signals).await
}

/// Spawns the background tasks and runs the acceptor until `shutdown`
/// resolves.
pub async fn serve<F>(mut server_context: ServerContext, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    spawner::spawn_all(&mut server_context);
    connection_loop::run(server_context, shutdown).await;
    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
fn shutdown_signal() -> Result<impl Future<Output = ()>> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow!("Failed to register SIGINT handler: {}", e))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow!("Failed to register SIGTERM handler: {}", e))?;
    Ok(async move {
        tokio::select! {
            _ = sigint.recv() => info!("SIGINT received, initiating graceful shutdown."),
            _ = sigterm.recv() => info!("SIGTERM received, initiating graceful shutdown."),
        }
    })
}

// src/server/initialization.rs

//! Handles server initialization: state setup and binding the listener.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::RelayError;
use crate::core::state::{LogReloadHandle, ServerState};
use anyhow::Result;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Initializes all server components before starting the main loop.
///
/// A failure to bind the listener is returned as [`RelayError::Bind`]; the
/// server never reports itself as listening in that case.
pub async fn setup(config: Config, log_reload_handle: LogReloadHandle) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let listener = match TcpListener::bind((config.host.as_str(), config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(
                "Failed to start service on {}: {}. Check whether the port is available or choose another free port.",
                bind_addr, e
            );
            return Err(RelayError::Bind {
                addr: bind_addr,
                source: Arc::new(e),
            }
            .into());
        }
    };

    let state = ServerState::new(config, log_reload_handle);
    info!("Server state initialized.");
    info!("linerelay listening on {}", listener.local_addr()?);

    Ok(ServerContext {
        state,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

/// Logs key configuration parameters at startup.
fn log_startup_info(config: &Config) {
    match config.queue.capacity {
        0 => warn!("WARNING: The message queue is unbounded. Memory use grows with any backlog."),
        capacity => info!(
            "Message queue bounded at {} messages (overflow policy: {:?}).",
            capacity, config.queue.overflow_policy
        ),
    }
    info!(
        "Max clients: {}, max line length: {} bytes, write timeout: {:?}.",
        config.max_clients, config.max_line_length, config.write_timeout
    );
}

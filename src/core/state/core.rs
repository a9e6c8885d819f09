// src/core/state/core.rs

//! Defines `ServerState`, the process-wide context shared by every task.

use super::stats::StatsState;
use crate::config::Config;
use crate::core::queue::MessageQueue;
use crate::core::registry::ConnectionRegistry;
use anyhow::{Result, anyhow};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, reload};

/// A handle to the logging filter, allowing for dynamic log level changes.
pub type LogReloadHandle = Arc<reload::Handle<EnvFilter, tracing_subscriber::Registry>>;

/// The shared state of a running relay.
///
/// Both the registry and the queue live exactly as long as the server; nothing
/// here survives a restart.
pub struct ServerState {
    /// The configuration the server was started with.
    pub config: Config,
    /// Every live connection.
    pub registry: ConnectionRegistry,
    /// Lines waiting to be broadcast.
    pub queue: MessageQueue,
    /// Holds all server-wide statistics.
    pub stats: StatsState,
    log_reload_handle: LogReloadHandle,
    session_id_counter: AtomicU64,
}

impl ServerState {
    /// Builds the shared state from the given configuration.
    pub fn new(config: Config, log_reload_handle: LogReloadHandle) -> Arc<Self> {
        let queue = MessageQueue::from_config(&config.queue);
        Arc::new(Self {
            config,
            registry: ConnectionRegistry::new(),
            queue,
            stats: StatsState::new(),
            log_reload_handle,
            session_id_counter: AtomicU64::new(0),
        })
    }

    /// Hands out the next session id. Ids start at 1 and are never reused.
    pub fn next_session_id(&self) -> u64 {
        self.session_id_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Replaces the active log filter, e.g. `"debug"` or `"info,linerelay=trace"`.
    pub fn set_log_level(&self, directives: &str) -> Result<()> {
        let filter = EnvFilter::try_new(directives)
            .map_err(|e| anyhow!("Invalid log directives '{directives}': {e}"))?;
        self.log_reload_handle
            .reload(filter)
            .map_err(|e| anyhow!("Failed to reload log filter: {e}"))?;
        info!("Log level changed to '{}'.", directives);
        Ok(())
    }
}

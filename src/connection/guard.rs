// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection resource management.

use super::handle::Connection;
use crate::core::state::ServerState;
use std::sync::Arc;
use tracing::debug;

/// An RAII guard that deregisters a connection when its collector's scope is
/// exited, whether the collector returned, panicked, or was aborted.
pub struct ConnectionGuard {
    /// A shared reference to the server state.
    state: Arc<ServerState>,
    /// The connection being guarded.
    conn: Arc<Connection>,
}

impl ConnectionGuard {
    /// Creates a new `ConnectionGuard`.
    pub(crate) fn new(state: Arc<ServerState>, conn: Arc<Connection>) -> Self {
        Self { state, conn }
    }
}

impl Drop for ConnectionGuard {
    /// Marks the connection closed and removes it from the registry.
    fn drop(&mut self) {
        self.conn.mark_closed();
        if self.state.registry.remove(self.conn.id()).is_some() {
            debug!(
                "ConnectionGuard removed {} (session {}) from the registry after {:?}.",
                self.conn.addr(),
                self.conn.id(),
                self.conn.age()
            );
        } else {
            debug!(
                "Connection {} was already deregistered (failed write or shutdown).",
                self.conn.addr()
            );
        }
    }
}

// src/core/registry.rs

//! The authoritative set of live connections.

use crate::connection::Connection;
use crate::core::metrics;
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// A lock-guarded set of connections keyed by session id.
///
/// The lock only ever covers in-memory map operations. Broadcasting works on
/// a [`snapshot`](Self::snapshot) taken under the lock and used after it is
/// released, so a slow client write can never block accepts or disconnects.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    members: Mutex<IndexMap<u64, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a connection. Ids are unique, so this never replaces a member.
    pub fn add(&self, conn: Arc<Connection>) {
        let mut members = self.members.lock();
        members.insert(conn.id(), conn);
        metrics::CONNECTED_CLIENTS.set(members.len() as f64);
    }

    /// Removes the connection with `id`. Removing an absent id is a no-op.
    pub fn remove(&self, id: u64) -> Option<Arc<Connection>> {
        let mut members = self.members.lock();
        let removed = members.shift_remove(&id);
        if removed.is_some() {
            metrics::CONNECTED_CLIENTS.set(members.len() as f64);
        }
        removed
    }

    pub fn get(&self, id: u64) -> Option<Arc<Connection>> {
        self.members.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.members.lock().contains_key(&id)
    }

    /// A point-in-time copy of the members, in registration order.
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.members.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.lock().is_empty()
    }

    /// Empties the registry and closes every former member.
    pub async fn close_all(&self) {
        let drained: Vec<Arc<Connection>> = {
            let mut members = self.members.lock();
            let drained = members.drain(..).map(|(_, conn)| conn).collect();
            metrics::CONNECTED_CLIENTS.set(0.0);
            drained
        };
        debug!("Closing {} registered connections.", drained.len());
        futures::future::join_all(drained.iter().map(|conn| conn.close())).await;
    }
}

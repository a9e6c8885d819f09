// src/connection/handle.rs

//! Defines `Connection`, the shared write side of one client socket.

use crate::core::RelayError;
use crate::core::protocol::LineCodec;
use futures::SinkExt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, broadcast};
use tokio_util::codec::FramedWrite;
use tracing::debug;

/// The type-erased outbound half of a client stream.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One live client, as seen by the registry and the distributor.
///
/// The read half is owned by the connection's `MessageCollector`. The write
/// half lives here so the distributor can reach it through a registry
/// snapshot. Closing is guarded by a flag and only the first call acts.
pub struct Connection {
    id: u64,
    addr: SocketAddr,
    created: Instant,
    writer: Mutex<FramedWrite<BoxedWriter, LineCodec>>,
    closed: AtomicBool,
    /// Fired once on close so the collector stops reading.
    kill_tx: broadcast::Sender<()>,
}

impl Connection {
    /// Creates a connection around `writer` and returns the receiver the
    /// collector should watch for the close signal.
    pub fn new<W>(id: u64, addr: SocketAddr, writer: W) -> (Self, broadcast::Receiver<()>)
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (kill_tx, kill_rx) = broadcast::channel(1);
        let writer: BoxedWriter = Box::new(writer);
        let conn = Self {
            id,
            addr,
            created: Instant::now(),
            writer: Mutex::new(FramedWrite::new(writer, LineCodec::new())),
            closed: AtomicBool::new(false),
            kill_tx,
        };
        (conn, kill_rx)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn age(&self) -> Duration {
        self.created.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Writes `line` plus a terminator, giving up after `timeout`.
    pub async fn send_line(&self, line: &str, timeout: Duration) -> Result<(), RelayError> {
        if self.is_closed() {
            return Err(RelayError::ConnectionClosed);
        }
        let write = async {
            let mut writer = self.writer.lock().await;
            writer.send(line).await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(RelayError::WriteTimeout(timeout)),
        }
    }

    /// Marks the connection closed and signals its collector.
    ///
    /// Returns `true` only for the call that performed the transition.
    pub fn mark_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        // The collector may already be gone; nobody to tell in that case.
        let _ = self.kill_tx.send(());
        true
    }

    /// Marks the connection closed and shuts the write half down.
    ///
    /// Repeated calls are no-ops.
    pub async fn close(&self) {
        if !self.mark_closed() {
            return;
        }
        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.get_mut().shutdown().await {
            debug!("Shutdown of write half for {} failed: {}", self.addr, e);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("closed", &self.is_closed())
            .finish()
    }
}

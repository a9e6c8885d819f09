// src/connection/collector.rs

//! Defines the `MessageCollector`, which owns the read side of one client
//! connection for the connection's whole lifetime.

use super::guard::ConnectionGuard;
use super::handle::Connection;
use crate::core::metrics;
use crate::core::protocol::LineCodec;
use crate::core::state::ServerState;
use crate::core::{EnqueueOutcome, RelayError};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio::sync::broadcast;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, trace};

/// The type-erased inbound half of a client stream.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Reads lines from one connection and pushes each onto the message queue.
pub struct MessageCollector {
    reader: FramedRead<BoxedReader, LineCodec>,
    conn: Arc<Connection>,
    state: Arc<ServerState>,
    kill_rx: broadcast::Receiver<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl MessageCollector {
    /// Registers a connection built from the two halves of a client stream and
    /// returns the collector bound to it.
    pub fn attach<R, W>(
        state: &Arc<ServerState>,
        addr: SocketAddr,
        reader: R,
        writer: W,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: tokio::io::AsyncWrite + Send + Unpin + 'static,
    {
        let session_id = state.next_session_id();
        let (conn, kill_rx) = Connection::new(session_id, addr, writer);
        let conn = Arc::new(conn);
        state.registry.add(conn.clone());

        let reader: BoxedReader = Box::new(reader);
        let codec = LineCodec::with_max_length(state.config.max_line_length);
        Self {
            reader: FramedRead::new(reader, codec),
            conn,
            state: state.clone(),
            kill_rx,
            shutdown_rx,
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Reads until end-of-stream, a read error, the connection being closed
    /// elsewhere, or server shutdown. The connection is always closed and
    /// deregistered on the way out.
    pub async fn run(mut self) -> Result<(), RelayError> {
        let _guard = ConnectionGuard::new(self.state.clone(), self.conn.clone());
        let addr = self.conn.addr();

        let result = 'read_loop: loop {
            tokio::select! {
                // Prioritize shutdown signals over other events.
                biased;
                _ = self.shutdown_rx.recv() => {
                    info!("Collector for {} received shutdown signal.", addr);
                    break 'read_loop Ok(());
                }
                _ = self.kill_rx.recv() => {
                    debug!("Collector for {} stopped: connection was closed.", addr);
                    break 'read_loop Ok(());
                }
                frame = self.reader.next() => match frame {
                    Some(Ok(line)) => {
                        trace!("Session {}: received line of {} bytes.", self.conn.id(), line.len());
                        self.state.stats.increment_total_messages();
                        metrics::MESSAGES_RECEIVED_TOTAL.inc();
                        match self.state.queue.enqueue(line).await {
                            Ok(EnqueueOutcome::DroppedNewest) => {
                                debug!("Line from {} dropped: queue is full.", addr);
                            }
                            Ok(_) => {}
                            Err(e) => {
                                debug!("Collector for {} stopping: {}", addr, e);
                                break 'read_loop Ok(());
                            }
                        }
                    }
                    Some(Err(e)) if e.is_normal_disconnect() => {
                        debug!("Connection from {} closed by peer: {}", addr, e);
                        break 'read_loop Ok(());
                    }
                    Some(Err(e)) => break 'read_loop Err(e),
                    None => {
                        debug!("Connection from {} closed by peer.", addr);
                        break 'read_loop Ok(());
                    }
                }
            }
        };

        self.conn.close().await;
        result
    }
}

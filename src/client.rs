// src/client.rs

//! The client side of the relay: connects to a server, sends lines, and
//! hands every received line to a [`MessageSink`].
//!
//! Presentation (a terminal, a window) is left to the caller. This module only
//! deals in text lines and the chat payload format every client agrees on.

use crate::core::RelayError;
use crate::core::protocol::{DEFAULT_MAX_LINE_LENGTH, LineCodec};
use chrono::{Local, NaiveTime};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, warn};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_USER: &str = "anonymous_client";
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Receives lines from the server, once per line, in receipt order.
pub trait MessageSink: Send + 'static {
    fn deliver(&mut self, line: String);

    /// Called once when the server side of the stream ends.
    fn disconnected(&mut self) {}
}

/// Any `FnMut(String)` closure can act as a sink.
impl<F> MessageSink for F
where
    F: FnMut(String) + Send + 'static,
{
    fn deliver(&mut self, line: String) {
        self(line)
    }
}

/// The join announcement a client sends right after connecting.
pub fn join_announcement(user: &str, at: NaiveTime) -> String {
    format!("{} {} joins the room!", at.format("%H:%M:%S"), user)
}

/// A chat message: a `"HH:MM:SS user:"` header line, then the text indented
/// by four spaces on the next line.
pub fn format_message(user: &str, text: &str, at: NaiveTime) -> String {
    format!("{} {}:\n    {}", at.format("%H:%M:%S"), user, text)
}

/// A live connection to a relay server.
pub struct RelayClient {
    user: String,
    writer: FramedWrite<OwnedWriteHalf, LineCodec>,
    reader_task: JoinHandle<()>,
}

impl RelayClient {
    /// Connects to `host:port` and starts delivering inbound lines to `sink`.
    ///
    /// No announcement is sent; call [`announce`](Self::announce) for that.
    /// Inbound lines are limited to the server's default `max_line_length`;
    /// use [`connect_with_max_line_length`](Self::connect_with_max_line_length)
    /// against a server configured with a larger limit.
    pub async fn connect<S: MessageSink>(
        host: &str,
        port: u16,
        user: impl Into<String>,
        sink: S,
    ) -> Result<Self, RelayError> {
        Self::connect_with_max_line_length(host, port, user, DEFAULT_MAX_LINE_LENGTH, sink).await
    }

    /// Like [`connect`](Self::connect), accepting inbound lines of up to
    /// `max_line_length` bytes.
    pub async fn connect_with_max_line_length<S: MessageSink>(
        host: &str,
        port: u16,
        user: impl Into<String>,
        max_line_length: usize,
        sink: S,
    ) -> Result<Self, RelayError> {
        let addr = format!("{host}:{port}");
        let stream = match tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(stream) => stream?,
            Err(_) => {
                return Err(RelayError::ConnectTimeout {
                    addr,
                    timeout: CONNECT_TIMEOUT,
                });
            }
        };
        debug!("Connected to relay at {}.", addr);

        let (reader, writer) = stream.into_split();
        let lines = FramedRead::new(reader, LineCodec::with_max_length(max_line_length));
        let reader_task = tokio::spawn(deliver_lines(lines, sink));

        Ok(Self {
            user: user.into(),
            writer: FramedWrite::new(writer, LineCodec::new()),
            reader_task,
        })
    }

    /// Sends one raw line. The relay broadcasts it unchanged.
    pub async fn send_line(&mut self, line: &str) -> Result<(), RelayError> {
        self.writer.send(line).await
    }

    /// Sends the join announcement for this client's user.
    pub async fn announce(&mut self) -> Result<(), RelayError> {
        let hello = join_announcement(&self.user, Local::now().time());
        self.send_line(&hello).await
    }

    /// Sends `text` as a chat message from this client's user.
    pub async fn say(&mut self, text: &str) -> Result<(), RelayError> {
        let message = format_message(&self.user, text, Local::now().time());
        self.send_line(&message).await
    }

    /// Closes the outbound half and waits for the server to end the stream.
    pub async fn close(mut self) -> Result<(), RelayError> {
        SinkExt::<&str>::close(&mut self.writer).await?;
        if let Err(e) = self.reader_task.await {
            warn!("Client reader task ended abnormally: {}", e);
        }
        Ok(())
    }
}

async fn deliver_lines<S: MessageSink>(
    mut lines: FramedRead<tokio::net::tcp::OwnedReadHalf, LineCodec>,
    mut sink: S,
) {
    while let Some(frame) = lines.next().await {
        match frame {
            Ok(line) => sink.deliver(line),
            Err(e) => {
                if !e.is_normal_disconnect() {
                    warn!("Dropping connection to relay: {}", e);
                }
                break;
            }
        }
    }
    sink.disconnected();
}

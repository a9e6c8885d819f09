// src/core/errors.rs

//! Defines the primary error type for the relay.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Every failure the relay core can surface.
///
/// `std::io::Error` is wrapped in an `Arc` so the whole enum stays `Clone`,
/// which lets a single write failure be reported to both the log and the
/// broadcast report without re-creating it.
#[derive(Error, Debug, Clone)]
pub enum RelayError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Line exceeds the maximum length of {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Line is not valid UTF-8")]
    InvalidUtf8,

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Connect to {addr} timed out after {timeout:?}")]
    ConnectTimeout { addr: String, timeout: Duration },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Message queue is closed")]
    QueueClosed,

    #[error("Failed to bind listener on {addr}: {source}")]
    Bind {
        addr: String,
        source: Arc<std::io::Error>,
    },
}

impl RelayError {
    /// True for errors that simply mean the peer went away.
    pub fn is_normal_disconnect(&self) -> bool {
        matches!(self, RelayError::Io(e) if matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionAborted
        )) || matches!(self, RelayError::ConnectionClosed)
    }
}

impl PartialEq for RelayError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (RelayError::Io(e1), RelayError::Io(e2)) => e1.kind() == e2.kind(),
            (RelayError::LineTooLong { limit: l1 }, RelayError::LineTooLong { limit: l2 }) => {
                l1 == l2
            }
            (RelayError::WriteTimeout(d1), RelayError::WriteTimeout(d2)) => d1 == d2,
            (
                RelayError::ConnectTimeout { addr: a1, .. },
                RelayError::ConnectTimeout { addr: a2, .. },
            ) => a1 == a2,
            (RelayError::Bind { addr: a1, .. }, RelayError::Bind { addr: a2, .. }) => a1 == a2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Io(Arc::new(e))
    }
}

impl From<std::str::Utf8Error> for RelayError {
    fn from(_: std::str::Utf8Error) -> Self {
        RelayError::InvalidUtf8
    }
}

impl From<std::string::FromUtf8Error> for RelayError {
    fn from(_: std::string::FromUtf8Error) -> Self {
        RelayError::InvalidUtf8
    }
}

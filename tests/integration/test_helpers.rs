// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests
#![allow(dead_code)]

use linerelay::config::Config;
use linerelay::core::state::{LogReloadHandle, ServerState};
use linerelay::server;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, reload};

/// How long a test waits for something that should happen promptly.
pub const WAIT: Duration = Duration::from_secs(5);

/// Installs a test-friendly subscriber (once) and returns a reload handle.
pub fn log_reload_handle() -> LogReloadHandle {
    let env_filter = EnvFilter::new("warn");
    let (filter, reload_handle) = reload::Layer::new(env_filter);

    // Initialize tracing (ignore error if already initialized)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();

    Arc::new(reload_handle)
}

/// A config bound to an ephemeral loopback port with a short write timeout.
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        write_timeout: Duration::from_millis(500),
        ..Config::default()
    }
}

/// Shared state without a running server, for driving components directly.
pub fn new_state(config: Config) -> Arc<ServerState> {
    ServerState::new(config, log_reload_handle())
}

/// TestContext runs a real relay on a loopback port.
pub struct TestContext {
    pub state: Arc<ServerState>,
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: JoinHandle<anyhow::Result<()>>,
}

impl TestContext {
    /// Starts a relay with the default test configuration.
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    /// Starts a relay with a custom configuration.
    pub async fn with_config(config: Config) -> Self {
        let ctx = server::setup(config, log_reload_handle())
            .await
            .expect("Failed to start test server");
        let state = ctx.state.clone();
        let addr = ctx.local_addr().expect("listener has no local address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(server::serve(ctx, async move {
            let _ = shutdown_rx.await;
        }));

        Self {
            state,
            addr,
            shutdown_tx: Some(shutdown_tx),
            server,
        }
    }

    /// Opens a raw TCP client to the relay.
    pub async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("Failed to connect to test server");
        TestClient::new(stream)
    }

    /// Opens `n` clients and waits until all of them are registered.
    pub async fn connect_many(&self, n: usize) -> Vec<TestClient> {
        let before = self.state.registry.len();
        let mut clients = Vec::with_capacity(n);
        for _ in 0..n {
            clients.push(self.connect().await);
        }
        self.wait_for_clients(before + n).await;
        clients
    }

    /// Waits until the registry holds exactly `expected` connections.
    pub async fn wait_for_clients(&self, expected: usize) {
        let state = self.state.clone();
        let reached = tokio::time::timeout(WAIT, async move {
            while state.registry.len() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(
            reached.is_ok(),
            "registry has {} connections, expected {}",
            self.state.registry.len(),
            expected
        );
    }

    /// Triggers a graceful shutdown and waits for the server to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let result = tokio::time::timeout(Duration::from_secs(15), &mut self.server)
            .await
            .expect("server did not shut down in time")
            .expect("server task panicked");
        result.expect("server returned an error");
    }
}

/// A line-oriented raw TCP client.
pub struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    pub fn new(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    /// Sends `line` followed by `\n`.
    pub async fn send(&mut self, line: &str) {
        self.send_raw(format!("{line}\n").as_bytes()).await;
    }

    /// Sends bytes exactly as given.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write failed");
        self.writer.flush().await.expect("flush failed");
    }

    /// Receives the next line, failing the test if none arrives in time.
    /// Returns `None` when the server closed the stream.
    pub async fn recv(&mut self) -> Option<String> {
        tokio::time::timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap_or(None)
    }

    /// Receives the next line if one arrives within `wait`.
    pub async fn recv_within(&mut self, wait: Duration) -> Option<String> {
        match tokio::time::timeout(wait, self.lines.next_line()).await {
            Ok(Ok(line)) => line,
            _ => None,
        }
    }

    /// Half-closes the outbound side so the server sees end-of-stream.
    pub async fn finish(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

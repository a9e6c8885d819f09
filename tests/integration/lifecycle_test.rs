// tests/integration/lifecycle_test.rs

//! Integration tests for the connection lifecycle
//! Tests: deregistration on EOF, abrupt disconnects, bind failure, client
//! limit, oversized lines, shutdown

use super::test_helpers::{TestContext, log_reload_handle, test_config};
use linerelay::core::RelayError;
use linerelay::server;
use std::time::Duration;
use tokio::net::TcpStream;

#[tokio::test]
async fn test_registry_empty_after_all_clients_disconnect() {
    let ctx = TestContext::new().await;
    let clients = ctx.connect_many(10).await;
    assert_eq!(ctx.state.registry.len(), 10);

    drop(clients);

    ctx.wait_for_clients(0).await;
    assert!(ctx.state.registry.is_empty());
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_half_close_deregisters_and_closes_connection() {
    let ctx = TestContext::new().await;
    let mut clients = ctx.connect_many(1).await;

    clients[0].finish().await;

    ctx.wait_for_clients(0).await;
    // The server closes its side too once the collector is done.
    assert_eq!(clients[0].recv().await, None);
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_abrupt_disconnect_does_not_stop_distributor() {
    let ctx = TestContext::new().await;
    let mut clients = ctx.connect_many(3).await;

    let gone = clients.remove(0);
    drop(gone);

    // Broadcast while the dropped peer may still be registered.
    clients[0].send("still here").await;
    assert_eq!(clients[0].recv().await.as_deref(), Some("still here"));
    assert_eq!(clients[1].recv().await.as_deref(), Some("still here"));

    ctx.wait_for_clients(2).await;
    clients[1].send("next").await;
    assert_eq!(clients[0].recv().await.as_deref(), Some("next"));
    assert_eq!(clients[1].recv().await.as_deref(), Some("next"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_connection_reset_mid_broadcast_only_drops_that_peer() {
    let ctx = TestContext::new().await;
    let mut clients = ctx.connect_many(2).await;
    let doomed = TcpStream::connect(ctx.addr).await.unwrap();
    ctx.wait_for_clients(3).await;

    // A zero linger turns the close into a RST instead of a FIN.
    #[allow(deprecated)]
    doomed.set_linger(Some(Duration::ZERO)).unwrap();

    for i in 0..25 {
        clients[0].send(&format!("m{i}")).await;
    }
    drop(doomed);
    for i in 25..50 {
        clients[0].send(&format!("m{i}")).await;
    }

    for client in clients.iter_mut() {
        for i in 0..50 {
            assert_eq!(client.recv().await, Some(format!("m{i}")));
        }
    }
    ctx.wait_for_clients(2).await;

    clients[1].send("after reset").await;
    assert_eq!(clients[0].recv().await.as_deref(), Some("after reset"));
    assert_eq!(clients[1].recv().await.as_deref(), Some("after reset"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let mut config = test_config();
    config.port = port;
    let result = server::setup(config, log_reload_handle()).await;

    let err = match result {
        Ok(_) => panic!("setup succeeded on an occupied port"),
        Err(e) => e,
    };
    match err.downcast_ref::<RelayError>() {
        Some(RelayError::Bind { addr, .. }) => {
            assert_eq!(addr, &format!("127.0.0.1:{port}"));
        }
        other => panic!("expected a bind error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_clients_beyond_max_clients_are_rejected() {
    let mut config = test_config();
    config.max_clients = 2;
    let ctx = TestContext::with_config(config).await;
    let _admitted = ctx.connect_many(2).await;

    let mut extra = ctx.connect().await;

    assert_eq!(extra.recv().await, None);
    assert_eq!(ctx.state.registry.len(), 2);
    assert_eq!(ctx.state.stats.get_rejected_connections(), 1);
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_oversized_line_drops_only_the_sender() {
    let mut config = test_config();
    config.max_line_length = 16;
    let ctx = TestContext::with_config(config).await;
    let mut clients = ctx.connect_many(2).await;

    clients[0].send(&"x".repeat(100)).await;

    ctx.wait_for_clients(1).await;
    clients[1].send("short").await;
    assert_eq!(clients[1].recv().await.as_deref(), Some("short"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_invalid_utf8_drops_the_sender() {
    let ctx = TestContext::new().await;
    let mut clients = ctx.connect_many(2).await;

    clients[0].send_raw(&[0xff, 0xfe, b'\n']).await;

    ctx.wait_for_clients(1).await;
    clients[1].send("ok").await;
    assert_eq!(clients[1].recv().await.as_deref(), Some("ok"));
    ctx.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_closes_all_connections() {
    let ctx = TestContext::new().await;
    let mut clients = ctx.connect_many(3).await;
    let state = ctx.state.clone();

    ctx.shutdown().await;

    assert!(state.registry.is_empty());
    assert!(state.queue.is_closed());
    for client in clients.iter_mut() {
        assert_eq!(client.recv_within(Duration::from_secs(5)).await, None);
    }
}

#[tokio::test]
async fn test_stats_count_connections_and_messages() {
    let ctx = TestContext::new().await;
    let mut clients = ctx.connect_many(2).await;

    clients[0].send("one").await;
    clients[1].send("two").await;
    for client in clients.iter_mut() {
        client.recv().await;
        client.recv().await;
    }

    assert_eq!(ctx.state.stats.get_total_connections(), 2);
    assert_eq!(ctx.state.stats.get_total_messages(), 2);
    // Deliveries are tallied after the whole pass, which may trail the reads.
    let state = ctx.state.clone();
    tokio::time::timeout(Duration::from_secs(5), async move {
        while state.stats.get_total_deliveries() < 4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("deliveries were never counted");
    assert_eq!(ctx.state.stats.get_total_deliveries(), 4);
    ctx.shutdown().await;
}

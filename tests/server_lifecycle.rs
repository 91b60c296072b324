#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! End-to-end lifecycle tests against real sockets: echo traffic, protocol
//! faults, admission control, shutdown, hooks, and the property store.

mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wiregate::protocol::router::{Request, Router};
use wiregate::server::Server;
use wiregate::WireError;

struct EchoRouter;

#[async_trait]
impl Router for EchoRouter {
    async fn handle(&self, request: &Request) {
        let payload = request.data().to_vec();
        request
            .conn()
            .send_msg(request.msg_id(), payload)
            .await
            .expect("echo reply should enqueue");
    }
}

struct CountingRouter {
    handled: Arc<AtomicUsize>,
}

#[async_trait]
impl Router for CountingRouter {
    async fn handle(&self, _request: &Request) {
        self.handled.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn echo_round_trip_over_raw_socket() {
    let server = Server::new(common::test_config(10, 1));
    server.add_router(1, Arc::new(EchoRouter));
    let addr = common::start(&server).await;

    let mut client = TcpStream::connect(addr).await.unwrap();

    // Header {payload_len=5, msg_id=1} + "hello", all big-endian.
    let mut frame = Vec::new();
    frame.extend_from_slice(&5u32.to_be_bytes());
    frame.extend_from_slice(&1u32.to_be_bytes());
    frame.extend_from_slice(b"hello");
    client.write_all(&frame).await.unwrap();

    let mut reply = [0u8; 13];
    client.read_exact(&mut reply).await.unwrap();
    assert_eq!(&reply[0..4], &5u32.to_be_bytes());
    assert_eq!(&reply[4..8], &1u32.to_be_bytes());
    assert_eq!(&reply[8..], b"hello");

    server.stop();
}

#[tokio::test]
async fn oversized_header_aborts_before_any_router_runs() {
    let handled = Arc::new(AtomicUsize::new(0));
    let server = Server::new(common::test_config(10, 1));
    server.add_router(
        1,
        Arc::new(CountingRouter {
            handled: Arc::clone(&handled),
        }),
    );
    let addr = common::start(&server).await;

    let mut client = TcpStream::connect(addr).await.unwrap();

    // Declared length of 100_000 against the 4096 default maximum.
    let mut header = Vec::new();
    header.extend_from_slice(&100_000u32.to_be_bytes());
    header.extend_from_slice(&1u32.to_be_bytes());
    client.write_all(&header).await.unwrap();

    // The server must abort the connection without reading a payload.
    let mut buf = [0u8; 1];
    let n = client.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "server should close the connection");
    assert_eq!(handled.load(Ordering::SeqCst), 0, "no router may run");

    common::wait_until("registry drained", || server.registry().is_empty()).await;
    server.stop();
}

#[tokio::test]
async fn admission_control_rejects_connections_at_capacity() {
    let server = Server::new(common::test_config(1, 1));
    let addr = common::start(&server).await;

    let _first = TcpStream::connect(addr).await.unwrap();
    common::wait_until("first connection registered", || {
        server.registry().len() == 1
    })
    .await;

    // Second connection is dropped before registration.
    let mut second = TcpStream::connect(addr).await.unwrap();
    let mut buf = [0u8; 1];
    let n = second.read(&mut buf).await.unwrap();
    assert_eq!(n, 0, "second connection should be closed immediately");
    assert_eq!(server.registry().len(), 1);

    server.stop();
}

#[tokio::test]
async fn stop_clears_registry_and_sends_fail_safely() {
    let server = Server::new(common::test_config(10, 2));
    let addr = common::start(&server).await;

    let mut c0 = TcpStream::connect(addr).await.unwrap();
    let mut c1 = TcpStream::connect(addr).await.unwrap();
    common::wait_until("both connections registered", || {
        server.registry().len() == 2
    })
    .await;

    let conn = server.registry().get(0).expect("connection 0 should exist");
    server.stop();

    assert_eq!(server.registry().len(), 0);

    // Outstanding handles to a stopped connection fail safely.
    let err = conn.send_msg(1, &b"late"[..]).await.unwrap_err();
    assert!(matches!(err, WireError::ConnectionClosed));

    // Both peers observe the close.
    let mut buf = [0u8; 1];
    assert_eq!(c0.read(&mut buf).await.unwrap(), 0);
    assert_eq!(c1.read(&mut buf).await.unwrap(), 0);
}

#[tokio::test]
async fn stop_during_dial_storm_leaves_registry_empty() {
    let server = Server::new(common::test_config(100, 1));
    let addr = common::start(&server).await;

    // Clients keep dialing through the shutdown so a freshly accepted socket
    // can race stop()'s cancel-then-clear sequence.
    let dialing = Arc::new(AtomicBool::new(true));
    let keep_dialing = Arc::clone(&dialing);
    let dialer = tokio::spawn(async move {
        let mut held = Vec::new();
        while keep_dialing.load(Ordering::SeqCst) {
            match TcpStream::connect(addr).await {
                Ok(stream) => held.push(stream),
                Err(_) => break,
            }
            tokio::task::yield_now().await;
        }
        held
    });

    common::wait_until("dial storm under way", || server.registry().len() >= 3).await;
    server.stop();

    // Nothing admitted during or after stop() may stay registered.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.registry().len(), 0);

    dialing.store(false, Ordering::SeqCst);
    let _ = dialer.await;
}

#[tokio::test]
async fn send_buff_msg_drops_on_full_queue_and_fails_after_stop() {
    let config = wiregate::ServerConfig::default_with_overrides(|c| {
        c.server.host = "127.0.0.1".to_string();
        c.server.port = 0;
        c.limits.worker_pool_size = 1;
        c.limits.send_queue_len = 1;
    });
    let server = Server::new(config);
    let addr = common::start(&server).await;

    // The client never reads, so the socket buffer and then the one-slot
    // outbound queue fill up behind the stalled write task.
    let _client = TcpStream::connect(addr).await.unwrap();
    common::wait_until("connection registered", || server.registry().len() == 1).await;
    let conn = server.registry().get(0).expect("connection 0 should exist");

    let mut full = None;
    for _ in 0..100_000 {
        match conn.send_buff_msg(1, vec![0u8; 4096]) {
            Ok(()) => tokio::task::yield_now().await,
            Err(e) => {
                full = Some(e);
                break;
            }
        }
    }
    assert!(
        matches!(full, Some(WireError::SendQueueFull)),
        "a full queue must drop the frame instead of waiting"
    );

    // Best-effort sends on a stopped connection fail the same way blocking
    // sends do.
    conn.stop();
    let err = conn.send_buff_msg(1, &b"late"[..]).unwrap_err();
    assert!(matches!(err, WireError::ConnectionClosed));

    server.stop();
}

#[tokio::test]
async fn lifecycle_hooks_fire_and_properties_round_trip() {
    let stopped_ids = Arc::new(Mutex::new(Vec::new()));
    let server = Server::new(common::test_config(10, 1));

    server.set_on_conn_start(|conn| {
        conn.set_property("greeting", Arc::new("hello".to_string()));
    });
    let stopped = Arc::clone(&stopped_ids);
    server.set_on_conn_stop(move |conn| {
        stopped.lock().unwrap().push(conn.id());
    });

    let addr = common::start(&server).await;
    let client = TcpStream::connect(addr).await.unwrap();
    common::wait_until("connection registered", || server.registry().len() == 1).await;

    let conn = server.registry().get(0).expect("connection 0 should exist");

    // Property set by the start hook is visible and typed.
    let value = conn.get_property("greeting").expect("property should exist");
    let greeting = value
        .downcast_ref::<String>()
        .expect("property should be a String");
    assert_eq!(greeting, "hello");

    conn.remove_property("greeting");
    let err = conn.get_property("greeting").unwrap_err();
    assert!(matches!(err, WireError::PropertyNotFound(_)));

    // Peer disconnect triggers the stop hook exactly once.
    drop(client);
    common::wait_until("stop hook fired", || !stopped_ids.lock().unwrap().is_empty()).await;
    assert_eq!(stopped_ids.lock().unwrap().as_slice(), &[0]);

    server.stop();
    assert_eq!(stopped_ids.lock().unwrap().len(), 1, "stop is idempotent");
}

#[tokio::test]
async fn bind_failure_surfaces_to_start_caller() {
    let server_a = Server::new(common::test_config(10, 1));
    let addr = common::start(&server_a).await;

    // Same host and port: bind must fail synchronously in start().
    let config = wiregate::ServerConfig::default_with_overrides(|c| {
        c.server.host = "127.0.0.1".to_string();
        c.server.port = addr.port();
    });
    let server_b = Server::new(config);
    let err = server_b.start().await.unwrap_err();
    assert!(matches!(err, WireError::Io(_)));

    server_a.stop();
}

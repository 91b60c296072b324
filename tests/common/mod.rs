#![allow(dead_code)]
//! Shared helpers for integration tests: servers bound to ephemeral ports
//! and polling helpers for asynchronous conditions.

use std::net::SocketAddr;
use std::time::Duration;

use wiregate::config::ServerConfig;
use wiregate::server::Server;

/// Config bound to an ephemeral localhost port with small, test-sized limits.
pub fn test_config(max_connections: usize, worker_pool_size: usize) -> ServerConfig {
    ServerConfig::default_with_overrides(|c| {
        c.server.host = "127.0.0.1".to_string();
        c.server.port = 0;
        c.limits.max_connections = max_connections;
        c.limits.worker_pool_size = worker_pool_size;
    })
}

/// Start a server and return it with the address it actually bound.
pub async fn start(server: &Server) -> SocketAddr {
    server.start().await.expect("server should start");
    server.local_addr().expect("listener should be bound")
}

/// Poll `cond` until it holds, failing the test after 5 seconds.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}

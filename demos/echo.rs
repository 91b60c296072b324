//! Minimal echo server: replies to message id 1 with the same payload.
//!
//! Run with `cargo run --example echo`, then talk to it with any client that
//! speaks the 8-byte length-prefixed wire format.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use wiregate::config::ServerConfig;
use wiregate::protocol::router::{Request, Router};
use wiregate::server::Server;
use wiregate::{logging, Result};

struct EchoRouter;

#[async_trait]
impl Router for EchoRouter {
    async fn handle(&self, request: &Request) {
        let payload = request.data().to_vec();
        let _ = request.conn().send_msg(request.msg_id(), payload).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::from_env()?;
    logging::init(&config.logging);

    let server = Server::new(config);
    server.set_on_conn_start(|conn| {
        info!(conn_id = conn.id(), peer = %conn.remote_addr(), "client connected");
    });
    server.set_on_conn_stop(|conn| {
        info!(conn_id = conn.id(), "client gone");
    });
    server.add_router(1, Arc::new(EchoRouter));

    server.serve().await
}

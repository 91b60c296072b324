//! # wiregate
//!
//! Connection-oriented TCP server framework: accepts sockets, frames a
//! length-prefixed wire protocol over the byte stream, routes decoded
//! messages to user-supplied routers through a bounded worker pool, and
//! manages connection lifecycle and backpressure.
//!
//! ## Wire format
//!
//! ```text
//! [PayloadLen(4, BE)] [MsgId(4, BE)] [Payload(N)]
//! ```
//!
//! No magic number, no version byte, no checksum: framing relies solely on
//! correct length accounting, and a declared length above the configured
//! maximum aborts the connection.
//!
//! ## Ordering and backpressure
//!
//! Every message from one connection is handled by the same worker
//! (`connection id % pool size`), strictly in arrival order. A full worker
//! queue stalls that connection's read loop, which stalls the remote peer
//! through TCP flow control; other connections are unaffected unless they
//! hash to the same worker.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use wiregate::config::ServerConfig;
//! use wiregate::protocol::router::{Request, Router};
//! use wiregate::server::Server;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl Router for Echo {
//!     async fn handle(&self, request: &Request) {
//!         let payload = request.data().to_vec();
//!         let _ = request.conn().send_msg(request.msg_id(), payload).await;
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> wiregate::Result<()> {
//!     let server = Server::new(ServerConfig::default());
//!     server.add_router(1, Arc::new(Echo));
//!     server.serve().await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;

pub use crate::config::ServerConfig;
pub use crate::core::codec::{FrameCodec, HEADER_LEN};
pub use crate::core::message::Message;
pub use crate::error::{Result, WireError};
pub use crate::protocol::router::{Request, Router};
pub use crate::server::connection::{Connection, PropertyValue};
pub use crate::server::Server;

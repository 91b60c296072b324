//! Router capability trait and the request objects handed to it.
//!
//! A [`Router`] handles every message carrying the id it was registered
//! under. The three hooks run in order for each request: `pre_handle`,
//! `handle`, `post_handle`. All hooks have default no-op bodies, so an
//! implementation overrides only what it needs.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::message::Message;
use crate::server::connection::Connection;

/// One routing unit: invoked for every request whose message id matches the
/// registration.
///
/// Hooks run on a dispatcher worker. A panic inside a hook is caught at the
/// worker boundary and logged; it neither kills the worker nor closes the
/// connection that produced the request.
#[async_trait]
pub trait Router: Send + Sync {
    /// Runs before `handle`.
    async fn pre_handle(&self, _request: &Request) {}

    /// Main business hook.
    async fn handle(&self, _request: &Request) {}

    /// Runs after `handle`.
    async fn post_handle(&self, _request: &Request) {}
}

/// Pairs a connection with one decoded message.
///
/// Created once per inbound frame and consumed by exactly one router
/// invocation.
pub struct Request {
    conn: Arc<Connection>,
    msg: Message,
}

impl Request {
    pub(crate) fn new(conn: Arc<Connection>, msg: Message) -> Self {
        Self { conn, msg }
    }

    /// Connection the message arrived on.
    pub fn conn(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Message id of the inbound frame.
    pub fn msg_id(&self) -> u32 {
        self.msg.id()
    }

    /// Payload of the inbound frame.
    pub fn data(&self) -> &[u8] {
        self.msg.payload()
    }
}

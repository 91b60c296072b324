//! One accepted socket, owned end to end.
//!
//! Each connection runs exactly two long-lived tasks: a read task that
//! decodes frames and submits them to the dispatcher, and a write task that
//! drains the outbound queue onto the socket. Every outbound frame passes
//! through the single write task, so concurrent senders can never interleave
//! partial frames on the wire.
//!
//! Shutdown is coordinated through a one-shot cancellation token observed by
//! both tasks; nothing polls a boolean. `stop()` is idempotent and may be
//! triggered by an I/O error, a protocol fault, an explicit call, or server
//! shutdown.

use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::codec::FrameCodec;
use crate::core::message::Message;
use crate::error::{Result, WireError};
use crate::protocol::router::Request;
use crate::server::ServerCtx;

/// Value stored in a connection's property map. Callers downcast to the
/// concrete type they stored.
pub type PropertyValue = Arc<dyn Any + Send + Sync>;

/// One live client connection.
pub struct Connection {
    id: u64,
    remote_addr: SocketAddr,
    outbound: mpsc::Sender<Message>,
    cancel: CancellationToken,
    stopped: AtomicBool,
    max_packet_size: usize,
    properties: Mutex<HashMap<String, PropertyValue>>,
    ctx: Arc<ServerCtx>,
}

impl Connection {
    /// Wrap an accepted socket, register it, invoke the on-connection-start
    /// hook, and spawn the read and write tasks.
    ///
    /// The caller (the accept loop) has already applied admission control.
    pub(crate) fn spawn(
        id: u64,
        stream: TcpStream,
        remote_addr: SocketAddr,
        ctx: Arc<ServerCtx>,
    ) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::channel(ctx.limits.send_queue_len);

        let conn = Arc::new(Self {
            id,
            remote_addr,
            outbound,
            cancel: CancellationToken::new(),
            stopped: AtomicBool::new(false),
            max_packet_size: ctx.limits.max_packet_size,
            properties: Mutex::new(HashMap::new()),
            ctx: Arc::clone(&ctx),
        });

        ctx.registry.add(Arc::clone(&conn));
        ctx.hooks.call_on_start(&conn);
        info!(conn_id = id, peer = %remote_addr, "connection started");

        tokio::spawn(read_loop(Arc::clone(&conn), read_half));
        tokio::spawn(write_loop(Arc::clone(&conn), write_half, outbound_rx));

        conn
    }

    /// Process-lifetime-unique connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Frame a message and enqueue it for the write task, waiting for queue
    /// space if the outbound queue is full.
    pub async fn send_msg(&self, msg_id: u32, data: impl Into<Bytes>) -> Result<()> {
        let msg = self.outbound_message(msg_id, data)?;
        self.outbound
            .send(msg)
            .await
            .map_err(|_| WireError::ConnectionClosed)
    }

    /// Frame a message and enqueue it best-effort: a full outbound queue
    /// drops the frame and reports `SendQueueFull` instead of waiting.
    pub fn send_buff_msg(&self, msg_id: u32, data: impl Into<Bytes>) -> Result<()> {
        let msg = self.outbound_message(msg_id, data)?;
        self.outbound.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => WireError::SendQueueFull,
            mpsc::error::TrySendError::Closed(_) => WireError::ConnectionClosed,
        })
    }

    fn outbound_message(&self, msg_id: u32, data: impl Into<Bytes>) -> Result<Message> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(WireError::ConnectionClosed);
        }
        let data = data.into();
        // Checked here so the caller gets the error, not the write task.
        if data.len() > self.max_packet_size {
            return Err(WireError::OversizedFrame(data.len()));
        }
        Ok(Message::new(msg_id, data))
    }

    /// Attach a named property to this connection.
    pub fn set_property(&self, key: impl Into<String>, value: PropertyValue) {
        self.properties_lock().insert(key.into(), value);
    }

    /// Look up a named property. An absent key is a `PropertyNotFound`
    /// error, never an ambiguous default value.
    pub fn get_property(&self, key: &str) -> Result<PropertyValue> {
        self.properties_lock()
            .get(key)
            .cloned()
            .ok_or_else(|| WireError::PropertyNotFound(key.to_string()))
    }

    /// Remove a named property. Removing an absent key is a no-op.
    pub fn remove_property(&self, key: &str) {
        self.properties_lock().remove(key);
    }

    /// Tear the connection down: cancel both tasks (which drop their socket
    /// halves, closing the socket), invoke the on-connection-stop hook, and
    /// remove this connection from the registry. Idempotent.
    pub fn stop(self: &Arc<Self>) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cancel.cancel();
        self.ctx.hooks.call_on_stop(self);
        self.ctx.registry.remove(self.id);
        info!(conn_id = self.id, peer = %self.remote_addr, "connection stopped");
    }

    fn properties_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PropertyValue>> {
        self.properties
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Read task: decode one frame at a time and submit it to the dispatcher.
///
/// A full worker queue suspends `submit`, which stalls this loop and stops
/// further reads from the socket; TCP flow control then throttles the peer.
/// Any decode fault, I/O fault, or clean EOF terminates the loop and stops
/// the connection.
async fn read_loop(conn: Arc<Connection>, read_half: OwnedReadHalf) {
    let mut frames = FramedRead::new(read_half, FrameCodec::new(conn.max_packet_size));

    loop {
        tokio::select! {
            _ = conn.cancel.cancelled() => break,
            frame = frames.next() => match frame {
                Some(Ok(msg)) => {
                    debug!(conn_id = conn.id, msg_id = msg.id(), len = msg.len(), "frame received");
                    let request = Request::new(Arc::clone(&conn), msg);
                    if conn.ctx.dispatcher.submit(request).await.is_err() {
                        break;
                    }
                }
                Some(Err(e)) => {
                    warn!(conn_id = conn.id, error = %e, "read loop terminating");
                    break;
                }
                None => {
                    debug!(conn_id = conn.id, "peer closed the stream");
                    break;
                }
            },
        }
    }

    conn.stop();
}

/// Write task: the only writer on this socket. Consumes the outbound queue
/// and frames each message onto the wire.
async fn write_loop(
    conn: Arc<Connection>,
    write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::Receiver<Message>,
) {
    let mut sink = FramedWrite::new(write_half, FrameCodec::new(conn.max_packet_size));

    loop {
        tokio::select! {
            _ = conn.cancel.cancelled() => break,
            msg = outbound_rx.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = sink.send(msg).await {
                        warn!(conn_id = conn.id, error = %e, "write loop terminating");
                        break;
                    }
                }
                None => break,
            },
        }
    }

    conn.stop();
}

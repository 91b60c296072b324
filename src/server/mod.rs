//! # Server
//!
//! Owns the listening socket and wires the registry, the dispatcher, and the
//! lifecycle hooks together.
//!
//! Binding happens synchronously inside [`Server::start`], so address
//! resolution and listen failures are returned to the caller instead of
//! dying silently inside a background task. Only the accept loop itself runs
//! unattended.

pub mod connection;
pub mod registry;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::{LimitsConfig, ServerConfig};
use crate::error::Result;
use crate::protocol::dispatcher::Dispatcher;
use crate::protocol::router::Router;
use crate::server::connection::Connection;
use crate::server::registry::ConnRegistry;

/// Lifecycle hook invoked synchronously when a connection starts or stops.
pub type ConnHook = Arc<dyn Fn(&Arc<Connection>) + Send + Sync>;

/// Hooks shared with every connection.
#[derive(Default)]
pub(crate) struct Hooks {
    on_start: RwLock<Option<ConnHook>>,
    on_stop: RwLock<Option<ConnHook>>,
}

impl Hooks {
    pub(crate) fn call_on_start(&self, conn: &Arc<Connection>) {
        if let Some(hook) = self.read(&self.on_start) {
            hook(conn);
        }
    }

    pub(crate) fn call_on_stop(&self, conn: &Arc<Connection>) {
        if let Some(hook) = self.read(&self.on_stop) {
            hook(conn);
        }
    }

    fn read(&self, slot: &RwLock<Option<ConnHook>>) -> Option<ConnHook> {
        slot.read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

/// State shared between the server, its accept loop, and every connection.
pub(crate) struct ServerCtx {
    pub(crate) limits: LimitsConfig,
    pub(crate) dispatcher: Dispatcher,
    pub(crate) registry: ConnRegistry,
    pub(crate) hooks: Hooks,
}

/// A TCP server instance.
pub struct Server {
    config: ServerConfig,
    ctx: Arc<ServerCtx>,
    next_conn_id: Arc<AtomicU64>,
    shutdown: CancellationToken,
    local_addr: RwLock<Option<SocketAddr>>,
}

impl Server {
    /// Build a server from configuration. No sockets are touched until
    /// [`start`](Self::start).
    pub fn new(config: ServerConfig) -> Self {
        let ctx = Arc::new(ServerCtx {
            limits: config.limits.clone(),
            dispatcher: Dispatcher::new(
                config.limits.worker_pool_size,
                config.limits.worker_queue_len,
            ),
            registry: ConnRegistry::new(),
            hooks: Hooks::default(),
        });

        Self {
            config,
            ctx,
            next_conn_id: Arc::new(AtomicU64::new(0)),
            shutdown: CancellationToken::new(),
            local_addr: RwLock::new(None),
        }
    }

    /// Register a router for a message id. Intended to be called before
    /// traffic begins.
    pub fn add_router(&self, msg_id: u32, router: Arc<dyn Router>) {
        self.ctx.dispatcher.add_router(msg_id, router);
    }

    /// Install the hook invoked synchronously when a connection starts.
    pub fn set_on_conn_start(&self, hook: impl Fn(&Arc<Connection>) + Send + Sync + 'static) {
        self.set_hook(&self.ctx.hooks.on_start, hook);
    }

    /// Install the hook invoked synchronously when a connection stops.
    pub fn set_on_conn_stop(&self, hook: impl Fn(&Arc<Connection>) + Send + Sync + 'static) {
        self.set_hook(&self.ctx.hooks.on_stop, hook);
    }

    /// Live-connection registry of this instance.
    pub fn registry(&self) -> &ConnRegistry {
        &self.ctx.registry
    }

    /// Validate configuration, bind the listener, start the worker pool, and
    /// hand the accept loop to a background task.
    ///
    /// Resolution and bind failures are startup faults returned from this
    /// call; they are never swallowed inside the background task.
    pub async fn start(&self) -> Result<()> {
        self.config.validate_strict()?;
        let addr = self.config.server.bind_addr()?;

        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        *self
            .local_addr
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(local_addr);

        self.ctx.dispatcher.start_workers();

        info!(
            name = %self.config.server.name,
            version = %self.config.server.version,
            addr = %local_addr,
            max_connections = self.config.limits.max_connections,
            max_packet_size = self.config.limits.max_packet_size,
            worker_pool_size = self.config.limits.worker_pool_size,
            "server listening"
        );

        tokio::spawn(accept_loop(
            listener,
            Arc::clone(&self.ctx),
            Arc::clone(&self.next_conn_id),
            self.config.limits.max_connections,
            self.shutdown.clone(),
        ));

        Ok(())
    }

    /// Start the server and block the caller indefinitely.
    pub async fn serve(&self) -> Result<()> {
        self.start().await?;
        std::future::pending::<()>().await;
        unreachable!()
    }

    /// Stop the accept loop and abruptly terminate every live connection.
    /// No graceful drain: worker tasks still in flight for a stopped
    /// connection run to completion, and their sends fail safely.
    pub fn stop(&self) {
        info!(name = %self.config.server.name, "server stopping");
        self.shutdown.cancel();
        self.ctx.registry.clear();
    }

    /// Configuration this server was built from.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Address the listener actually bound, once [`start`](Self::start) has
    /// succeeded. Useful when the configured port is 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self
            .local_addr
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_hook(
        &self,
        slot: &RwLock<Option<ConnHook>>,
        hook: impl Fn(&Arc<Connection>) + Send + Sync + 'static,
    ) {
        let mut guard = slot.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::new(hook));
    }
}

/// Accept sockets until shutdown. Admission control is hard: once the
/// registry is at capacity a new socket is dropped immediately, without being
/// wrapped or registered. That is an expected condition, not an error.
async fn accept_loop(
    listener: TcpListener,
    ctx: Arc<ServerCtx>,
    next_conn_id: Arc<AtomicU64>,
    max_connections: usize,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            // Once the token is cancelled, a simultaneously ready accept must
            // not win the race and register a connection behind stop()'s back.
            biased;

            _ = shutdown.cancelled() => {
                debug!("accept loop exiting");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    if shutdown.is_cancelled() {
                        drop(stream);
                        continue;
                    }
                    if ctx.registry.len() >= max_connections {
                        debug!(peer = %peer, max_connections, "at capacity, connection rejected");
                        drop(stream);
                        continue;
                    }
                    let conn_id = next_conn_id.fetch_add(1, Ordering::Relaxed);
                    let conn = Connection::spawn(conn_id, stream, peer, Arc::clone(&ctx));
                    // stop() cancels before it clears the registry. If the
                    // token flipped between the check above and registration,
                    // the clear may have missed this connection.
                    if shutdown.is_cancelled() {
                        conn.stop();
                    }
                }
                Err(e) => {
                    error!(error = %e, "accept failed");
                }
            },
        }
    }
}

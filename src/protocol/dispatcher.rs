//! Worker pool and router table.
//!
//! Requests are assigned to workers by `connection id % pool size`. The
//! assignment is static for a connection's lifetime, so every message from a
//! given connection is processed by exactly one worker, in arrival order.
//! Different connections proceed in parallel on different workers. The price
//! is head-of-line blocking: a slow worker delays every connection hashed to
//! it while other workers sit idle. That trade-off buys the ordering
//! guarantee and is intentional.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock, RwLock};

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::error::{Result, WireError};
use crate::protocol::router::{Request, Router};

type RouterTable = Arc<RwLock<HashMap<u32, Arc<dyn Router>>>>;

/// Fans requests out to a fixed pool of workers and invokes registered
/// routers.
pub struct Dispatcher {
    routers: RouterTable,
    workers: OnceLock<Vec<mpsc::Sender<Request>>>,
    pool_size: usize,
    queue_len: usize,
}

impl Dispatcher {
    /// Build a dispatcher with a fixed pool size and per-worker queue
    /// capacity. Workers are not spawned until
    /// [`start_workers`](Self::start_workers) runs inside a runtime.
    pub fn new(pool_size: usize, queue_len: usize) -> Self {
        Self {
            routers: Arc::new(RwLock::new(HashMap::new())),
            workers: OnceLock::new(),
            pool_size,
            queue_len,
        }
    }

    /// Spawn the long-lived workers, each single-consumer on its own bounded
    /// queue. Calling this more than once is a no-op.
    pub fn start_workers(&self) {
        self.workers.get_or_init(|| {
            let mut workers = Vec::with_capacity(self.pool_size);
            for worker_id in 0..self.pool_size {
                let (tx, rx) = mpsc::channel(self.queue_len);
                workers.push(tx);
                tokio::spawn(worker_loop(worker_id, rx, Arc::clone(&self.routers)));
            }
            debug!(
                pool_size = self.pool_size,
                queue_len = self.queue_len,
                "dispatcher worker pool started"
            );
            workers
        });
    }

    /// Register a router for a message id. Intended to be called before
    /// traffic begins; a later registration for the same id replaces the
    /// earlier one.
    pub fn add_router(&self, msg_id: u32, router: Arc<dyn Router>) {
        let mut table = self
            .routers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        table.insert(msg_id, router);
    }

    /// Hand a request to its statically assigned worker.
    ///
    /// Suspends while the worker's queue is full. The caller is the
    /// connection's read loop, so a saturated worker stalls further reads on
    /// that socket and TCP flow control throttles the peer. Backpressure,
    /// not message loss.
    pub async fn submit(&self, request: Request) -> Result<()> {
        let workers = self.workers.get().ok_or(WireError::WorkersNotStarted)?;
        let index = (request.conn().id() % workers.len() as u64) as usize;
        workers[index]
            .send(request)
            .await
            .map_err(|_| WireError::ConnectionClosed)
    }

    /// Number of workers in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

async fn worker_loop(worker_id: usize, mut rx: mpsc::Receiver<Request>, routers: RouterTable) {
    while let Some(request) = rx.recv().await {
        let msg_id = request.msg_id();
        let conn_id = request.conn().id();

        // Clone the router out so the table lock is not held across hooks.
        let router = {
            let table = routers
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            table.get(&msg_id).cloned()
        };

        let Some(router) = router else {
            warn!(worker_id, conn_id, msg_id, "no router registered, message dropped");
            continue;
        };

        let run = async {
            router.pre_handle(&request).await;
            router.handle(&request).await;
            router.post_handle(&request).await;
        };

        if let Err(panic) = AssertUnwindSafe(run).catch_unwind().await {
            let msg = panic_message(panic.as_ref());
            error!(worker_id, conn_id, msg_id, panic = %msg, "router hook panicked");
        }
    }
    debug!(worker_id, "dispatcher worker exiting");
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Live-connection table for one server instance.
//!
//! State is a single mutex-guarded map scoped to the registry instance; there
//! is no process-wide registry. The capacity invariant (`len()` never exceeds
//! the configured maximum) is enforced by the server's accept loop before a
//! socket is wrapped and registered.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::error::{Result, WireError};
use crate::server::connection::Connection;

/// Mapping from connection id to live connection.
#[derive(Default)]
pub struct ConnRegistry {
    conns: Mutex<HashMap<u64, Arc<Connection>>>,
}

impl ConnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its id.
    pub fn add(&self, conn: Arc<Connection>) {
        let mut conns = self.lock();
        conns.insert(conn.id(), conn);
        debug!(total = conns.len(), "connection registered");
    }

    /// Remove a connection by id. Removing an absent id is a no-op, not an
    /// error.
    pub fn remove(&self, conn_id: u64) {
        let mut conns = self.lock();
        if conns.remove(&conn_id).is_some() {
            debug!(conn_id, total = conns.len(), "connection removed");
        }
    }

    /// Look up a connection by id.
    pub fn get(&self, conn_id: u64) -> Result<Arc<Connection>> {
        self.lock()
            .get(&conn_id)
            .cloned()
            .ok_or(WireError::ConnectionNotFound(conn_id))
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Stop and remove every connection. Used at server shutdown; abrupt, no
    /// drain of in-flight requests.
    pub fn clear(&self) {
        // Drain under the lock, stop outside it: stop() re-enters remove().
        let drained: Vec<Arc<Connection>> = self.lock().drain().map(|(_, conn)| conn).collect();
        for conn in drained {
            conn.stop();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<Connection>>> {
        self.conns
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

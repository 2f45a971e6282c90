//! Connection identity and lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs (process-local, never reused)
//! - Track per-connection state (Accepted → Open → Closed)
//! - Guarantee the registry entry is removed exactly once, even on panic

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Bytes;
use tokio::sync::mpsc;

use crate::net::registry::{ConnectionHandle, ConnectionRegistry, RegistryError};
use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
///
/// Identifies a socket without owning it; safe to hand to other threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection state for lifecycle tracking.
///
/// Transitions only move forward; a closed connection is never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket accepted and upgraded, not yet registered.
    Accepted,
    /// Registered and able to receive `send` traffic.
    Open,
    /// Unregistered. Terminal.
    Closed,
}

/// Guard that owns a connection's registry entry.
///
/// Holds the only strong sender of the connection's outbound queue; the
/// registry keeps a weak one. Dropping the guard unregisters the connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
    state: ConnectionState,
    outbound: Option<mpsc::UnboundedSender<Bytes>>,
}

impl ConnectionGuard {
    /// Create a guard for a freshly accepted connection.
    pub fn accept(registry: Arc<ConnectionRegistry>) -> (Self, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let guard = Self {
            registry,
            id: ConnectionId::new(),
            state: ConnectionState::Accepted,
            outbound: Some(tx),
        };
        (guard, rx)
    }

    /// Register the connection, moving it to `Open`.
    pub fn open(&mut self) -> Result<(), RegistryError> {
        let Some(tx) = self.outbound.as_ref() else {
            return Err(RegistryError::ConnectionClosed(self.id));
        };
        self.registry.register(self.id, ConnectionHandle::new(tx))?;
        self.state = ConnectionState::Open;
        metrics::record_connections(self.registry.len());
        tracing::info!(connection_id = %self.id, "Connection opened");
        Ok(())
    }

    /// Unregister the connection. Idempotent from the guard's side; the
    /// registry still sees exactly one removal.
    pub fn close(&mut self) {
        // Drop the strong sender first so racing `send` calls observe the closure.
        self.outbound = None;
        if self.state != ConnectionState::Open {
            self.state = ConnectionState::Closed;
            return;
        }
        self.state = ConnectionState::Closed;
        if let Err(e) = self.registry.unregister(self.id) {
            tracing::error!(connection_id = %self.id, error = %e, "Registry out of sync on close");
        }
        metrics::record_connections(self.registry.len());
        tracing::info!(connection_id = %self.id, "Connection closed");
    }

    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn guard_walks_lifecycle() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (mut guard, _rx) = ConnectionGuard::accept(registry.clone());
        assert_eq!(guard.state(), ConnectionState::Accepted);
        assert!(registry.is_empty());

        guard.open().unwrap();
        assert_eq!(guard.state(), ConnectionState::Open);
        assert!(registry.contains(guard.id()));

        guard.close();
        assert_eq!(guard.state(), ConnectionState::Closed);
        assert!(registry.is_empty());

        // A second close must not touch the registry again.
        guard.close();
        assert_eq!(guard.state(), ConnectionState::Closed);
    }

    #[test]
    fn drop_unregisters() {
        let registry = Arc::new(ConnectionRegistry::new());
        let id = {
            let (mut guard, _rx) = ConnectionGuard::accept(registry.clone());
            guard.open().unwrap();
            assert_eq!(registry.len(), 1);
            guard.id()
        };
        assert!(!registry.contains(id));
        assert!(registry.resolve(id).is_err());
    }

    #[test]
    fn closed_guard_cannot_reopen() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (mut guard, _rx) = ConnectionGuard::accept(registry.clone());
        guard.open().unwrap();
        guard.close();
        assert!(matches!(guard.open(), Err(RegistryError::ConnectionClosed(_))));
        assert!(registry.is_empty());
    }
}

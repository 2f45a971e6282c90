//! Connection registry: `ConnectionId` → weak outbound handle.
//!
//! # Design Decisions
//! - An entry exists iff the gateway considers the connection open
//! - Writes happen on the reactor thread only; `resolve` may run anywhere
//! - Handles are weak so a torn-down socket is detectable before its entry is removed

use axum::body::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::net::connection::ConnectionId;

/// Registry failures. Duplicate/unknown IDs indicate a lifecycle bug.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
    #[error("connection {0} is not registered")]
    UnknownConnection(ConnectionId),
    #[error("connection {0} not found")]
    NotFound(ConnectionId),
    #[error("connection {0} is closed")]
    ConnectionClosed(ConnectionId),
}

/// Weak reference to a connection's outbound frame queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::WeakUnboundedSender<Bytes>,
}

impl ConnectionHandle {
    /// Downgrade the connection's sender. The caller keeps the strong side.
    pub fn new(outbound: &mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            outbound: outbound.downgrade(),
        }
    }

    /// Upgrade to a live sender, or `None` once the connection tore down.
    fn upgrade(&self) -> Option<mpsc::UnboundedSender<Bytes>> {
        self.outbound.upgrade().filter(|tx| !tx.is_closed())
    }
}

/// Concurrency-safe map of open connections.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: DashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Fails if the ID is already present.
    pub fn register(&self, id: ConnectionId, handle: ConnectionHandle) -> Result<(), RegistryError> {
        match self.entries.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::DuplicateConnection(id)),
            Entry::Vacant(slot) => {
                slot.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove a connection. Fails if the ID is absent.
    pub fn unregister(&self, id: ConnectionId) -> Result<(), RegistryError> {
        self.entries
            .remove(&id)
            .map(|_| ())
            .ok_or(RegistryError::UnknownConnection(id))
    }

    /// Look up a live sender for the connection.
    ///
    /// `ConnectionClosed` means the entry is still present but the socket is
    /// gone; callers must treat it like `NotFound`.
    pub fn resolve(&self, id: ConnectionId) -> Result<mpsc::UnboundedSender<Bytes>, RegistryError> {
        // Clone the handle out so the shard lock is not held while upgrading.
        let handle = self
            .entries
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(RegistryError::NotFound(id))?;
        handle.upgrade().ok_or(RegistryError::ConnectionClosed(id))
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn channel() -> (mpsc::UnboundedSender<Bytes>, mpsc::UnboundedReceiver<Bytes>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn register_resolve_unregister() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = channel();
        let id = ConnectionId::new();

        registry.register(id, ConnectionHandle::new(&tx)).unwrap();
        assert_eq!(registry.len(), 1);

        let sender = registry.resolve(id).unwrap();
        sender.send(Bytes::from_static(b"hi")).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"hi"));

        registry.unregister(id).unwrap();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve(id).unwrap_err(), RegistryError::NotFound(id));
    }

    #[test]
    fn duplicate_register_is_rejected() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();
        let id = ConnectionId::new();

        registry.register(id, ConnectionHandle::new(&tx)).unwrap();
        let err = registry.register(id, ConnectionHandle::new(&tx)).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateConnection(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unknown_unregister_is_rejected() {
        let registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        assert_eq!(registry.unregister(id).unwrap_err(), RegistryError::UnknownConnection(id));

        let (tx, _rx) = channel();
        registry.register(id, ConnectionHandle::new(&tx)).unwrap();
        registry.unregister(id).unwrap();
        assert_eq!(registry.unregister(id).unwrap_err(), RegistryError::UnknownConnection(id));
    }

    #[test]
    fn dropped_sender_resolves_closed() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();
        let id = ConnectionId::new();
        registry.register(id, ConnectionHandle::new(&tx)).unwrap();

        drop(tx);
        assert_eq!(registry.resolve(id).unwrap_err(), RegistryError::ConnectionClosed(id));
        // The entry stays until the reactor removes it.
        assert!(registry.contains(id));
    }

    #[test]
    fn dropped_receiver_resolves_closed() {
        let registry = ConnectionRegistry::new();
        let (tx, rx) = channel();
        let id = ConnectionId::new();
        registry.register(id, ConnectionHandle::new(&tx)).unwrap();

        drop(rx);
        assert_eq!(registry.resolve(id).unwrap_err(), RegistryError::ConnectionClosed(id));
    }

    #[test]
    fn count_tracks_opens_minus_closes() {
        let registry = ConnectionRegistry::new();
        let mut live: Vec<(ConnectionId, mpsc::UnboundedSender<Bytes>)> = Vec::new();
        let mut opens = 0usize;
        let mut closes = 0usize;

        // Deterministic interleaving of opens and closes.
        for step in 0..200u32 {
            if step % 3 == 2 && !live.is_empty() {
                let (id, _tx) = live.remove((step as usize * 7) % live.len());
                registry.unregister(id).unwrap();
                closes += 1;
            } else {
                let (tx, _rx) = channel();
                let id = ConnectionId::new();
                registry.register(id, ConnectionHandle::new(&tx)).unwrap();
                live.push((id, tx));
                opens += 1;
            }
            assert_eq!(registry.len(), opens - closes);
        }
    }

    #[test]
    fn concurrent_resolve_during_close() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, rx) = channel();
        let id = ConnectionId::new();
        registry.register(id, ConnectionHandle::new(&tx)).unwrap();

        let senders: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let mut failures = 0;
                    for _ in 0..1_000 {
                        match registry.resolve(id) {
                            Ok(sender) => {
                                if sender.send(Bytes::from_static(b"x")).is_err() {
                                    failures += 1;
                                }
                            }
                            Err(RegistryError::NotFound(_)) | Err(RegistryError::ConnectionClosed(_)) => {
                                failures += 1;
                            }
                            Err(other) => panic!("unexpected {other}"),
                        }
                    }
                    failures
                })
            })
            .collect();

        drop(tx);
        drop(rx);
        registry.unregister(id).unwrap();

        for handle in senders {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
        assert_eq!(registry.resolve(id).unwrap_err(), RegistryError::NotFound(id));
    }
}

//! Listening socket setup.
//!
//! # Responsibilities
//! - Bind the configured port before the reactor thread starts
//! - Surface bind failures synchronously to the caller of `connect`

use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use thiserror::Error;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// Bind all interfaces on `port`. Port `0` picks an ephemeral port.
///
/// std sets `SO_REUSEADDR` on Unix, so a restart does not wait out `TIME_WAIT`.
pub fn bind(port: u16) -> Result<(TcpListener, SocketAddr), ListenerError> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;
    let local_addr = listener
        .local_addr()
        .map_err(|source| ListenerError::Bind { addr, source })?;

    tracing::info!(address = %local_addr, "Listener bound");
    Ok((listener, local_addr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_port() {
        let (listener, addr) = bind(0).unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(listener.local_addr().unwrap(), addr);
    }

    #[test]
    fn port_in_use_fails() {
        let (_first, addr) = bind(0).unwrap();
        let port = addr.port();
        let err = bind(port).unwrap_err();
        assert!(matches!(err, ListenerError::Bind { addr, .. } if addr.port() == port));
    }
}

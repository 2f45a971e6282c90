//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! connect()
//!     → tls.rs (optional rustls context from PEM files)
//!     → listener.rs (synchronous bind)
//!     → reactor.rs (dedicated thread, current-thread runtime)
//!     → Hand off to HTTP layer
//!
//! Per connection:
//!     connection.rs (ID + guard)  ⇄  registry.rs (ID → weak outbound handle)
//!
//! Connection States:
//!     Accepted → Open → Closed
//! ```
//!
//! # Design Decisions
//! - Bind and TLS errors are reported before the reactor thread exists
//! - The registry is the only structure touched from several threads
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod reactor;
pub mod registry;
pub mod tls;

pub use connection::{ConnectionId, ConnectionState};
pub use reactor::ServerState;
pub use registry::{ConnectionRegistry, RegistryError};
pub use tls::{TlsConfigError, TlsProfile};

//! WebSocket/HTTP gateway.
//!
//! Accepts WebSocket connections and plain HTTP requests on one port,
//! optionally over TLS, and exposes them through a small facade: configure
//! with string-keyed options, register callbacks, `connect`, then `send`
//! frames to connections by id from any thread.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌──────────────────────────────────────────────┐
//!   client ──────▶│ net::listener ─▶ net::reactor (own thread)   │
//!   (WS / HTTP)   │                    │                         │
//!                 │         http::server (upgrade detection)     │
//!                 │           ├─ http::websocket ⇄ net::registry │
//!                 │           └─ http::request ─▶ http::handler  │
//!                 │                                              │
//!   host ────────▶│ gateway (set_option / register_* / connect / │
//!                 │          send / shutdown)                    │
//!                 │                                              │
//!   bus ◀────────▶│ bus::bridge ─▶ bus::fanout                   │
//!                 └──────────────────────────────────────────────┘
//! ```

pub mod bus;
pub mod config;
pub mod gateway;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use bus::{BusMessage, GatewayBridge, MessageBus};
pub use config::GatewayConfig;
pub use gateway::{Gateway, GatewayError, NetOption};
pub use http::{HttpRequest, HttpResponse};
pub use lifecycle::Shutdown;
pub use net::{ConnectionId, ServerState};

//! Message-bus boundary.
//!
//! # Data Flow
//! ```text
//! frame from client  → bridge.rs → fanout.rs → MessageBus::send         ("WEBSOCKET")
//! HTTP request       → bridge.rs → fanout.rs → MessageBus::send_request ("HTTP")
//! message from bus   → bridge.rs → "SUBSCRIBE" updates fan-out, anything else → Gateway::send
//! ```
//!
//! # Design Decisions
//! - The bus is injected as a trait object; nothing here knows what hosts the gateway
//! - The any-data slot is a closed enum with typed accessors, never a downcast

pub mod bridge;
pub mod fanout;
pub mod local;

use std::sync::Arc;

use axum::body::Bytes;
use thiserror::Error;

use crate::http::{HttpRequest, HttpResponse};
use crate::net::ConnectionId;

pub use bridge::{GatewayBridge, HttpMode};
pub use fanout::FanOut;
pub use local::{EchoEndpoint, Endpoint, LocalBus};

/// Type tag carried by every bus message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKind {
    WebSocket,
    Http,
    Subscribe,
    Other(String),
}

impl MessageKind {
    pub fn as_str(&self) -> &str {
        match self {
            MessageKind::WebSocket => "WEBSOCKET",
            MessageKind::Http => "HTTP",
            MessageKind::Subscribe => "SUBSCRIBE",
            MessageKind::Other(tag) => tag,
        }
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        match tag {
            "WEBSOCKET" => MessageKind::WebSocket,
            "HTTP" => MessageKind::Http,
            "SUBSCRIBE" => MessageKind::Subscribe,
            other => MessageKind::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque side value attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnyData {
    #[default]
    Empty,
    Connection(ConnectionId),
    HttpRequest(Arc<HttpRequest>),
    HttpResponse(Arc<HttpResponse>),
}

impl AnyData {
    fn name(&self) -> &'static str {
        match self {
            AnyData::Empty => "empty",
            AnyData::Connection(_) => "connection id",
            AnyData::HttpRequest(_) => "http request",
            AnyData::HttpResponse(_) => "http response",
        }
    }
}

/// The any-data slot held something other than what the reader asked for.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("payload type mismatch: expected {expected}, found {found}")]
pub struct PayloadTypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("no endpoint named '{0}'")]
    UnknownDestination(String),
    #[error("endpoint '{0}' produced no response")]
    NoResponse(String),
}

/// One message on the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub src: String,
    pub dst: String,
    pub kind: MessageKind,
    pub data: Bytes,
    pub any: AnyData,
}

impl BusMessage {
    pub fn new(kind: MessageKind) -> Self {
        Self {
            src: String::new(),
            dst: String::new(),
            kind,
            data: Bytes::new(),
            any: AnyData::Empty,
        }
    }

    /// A subscription request from `src` to the gateway endpoint `dst`.
    pub fn subscribe(src: impl Into<String>, dst: impl Into<String>) -> Self {
        Self::new(MessageKind::Subscribe).with_src(src).with_dst(dst)
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = src.into();
        self
    }

    pub fn with_dst(mut self, dst: impl Into<String>) -> Self {
        self.dst = dst.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_any(mut self, any: AnyData) -> Self {
        self.any = any;
        self
    }

    pub fn connection_id(&self) -> Result<ConnectionId, PayloadTypeMismatch> {
        match &self.any {
            AnyData::Connection(id) => Ok(*id),
            other => Err(mismatch("connection id", other)),
        }
    }

    pub fn http_request(&self) -> Result<Arc<HttpRequest>, PayloadTypeMismatch> {
        match &self.any {
            AnyData::HttpRequest(req) => Ok(req.clone()),
            other => Err(mismatch("http request", other)),
        }
    }

    pub fn http_response(&self) -> Result<Arc<HttpResponse>, PayloadTypeMismatch> {
        match &self.any {
            AnyData::HttpResponse(resp) => Ok(resp.clone()),
            other => Err(mismatch("http response", other)),
        }
    }
}

fn mismatch(expected: &'static str, found: &AnyData) -> PayloadTypeMismatch {
    PayloadTypeMismatch {
        expected,
        found: found.name(),
    }
}

/// A message-passing system the gateway publishes into.
///
/// `send_request` is a synchronous call/response; when invoked from an HTTP
/// handler it blocks the reactor until the peer answers.
pub trait MessageBus: Send + Sync {
    fn send(&self, msg: BusMessage) -> Result<(), BusError>;

    fn send_request(&self, msg: BusMessage) -> Result<BusMessage, BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_accessors() {
        let id = ConnectionId::new();
        let msg = BusMessage::new(MessageKind::WebSocket).with_any(AnyData::Connection(id));
        assert_eq!(msg.connection_id().unwrap(), id);

        let err = msg.http_response().unwrap_err();
        assert_eq!(err.expected, "http response");
        assert_eq!(err.found, "connection id");

        let empty = BusMessage::new(MessageKind::Http);
        assert_eq!(empty.connection_id().unwrap_err().found, "empty");
    }

    #[test]
    fn kind_tags() {
        for kind in [MessageKind::WebSocket, MessageKind::Http, MessageKind::Subscribe] {
            assert_eq!(MessageKind::from(kind.as_str()), kind);
        }
        assert_eq!(MessageKind::from("PING"), MessageKind::Other("PING".into()));
    }
}

//! In-process bus used by the binary and the tests.

use std::sync::{Arc, Weak};

use dashmap::DashMap;

use crate::bus::{AnyData, BusError, BusMessage, MessageBus, MessageKind};
use crate::http::HttpResponse;

/// Something addressable on a [`LocalBus`].
pub trait Endpoint: Send + Sync {
    fn on_message(&self, msg: BusMessage);

    fn on_request(&self, _msg: BusMessage) -> Option<BusMessage> {
        None
    }
}

/// Name-addressed, synchronous, same-thread delivery.
#[derive(Default)]
pub struct LocalBus {
    endpoints: DashMap<String, Arc<dyn Endpoint>>,
}

impl LocalBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Returns the endpoint previously registered under `name`, if any.
    pub fn register(&self, name: impl Into<String>, endpoint: Arc<dyn Endpoint>) -> Option<Arc<dyn Endpoint>> {
        let name = name.into();
        tracing::debug!(endpoint = %name, "Bus endpoint registered");
        self.endpoints.insert(name, endpoint)
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.endpoints.remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.endpoints.contains_key(name)
    }

    // Clone out so no shard lock is held while the endpoint runs; endpoints send re-entrantly.
    fn lookup(&self, name: &str) -> Result<Arc<dyn Endpoint>, BusError> {
        self.endpoints
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| BusError::UnknownDestination(name.to_string()))
    }
}

impl MessageBus for LocalBus {
    fn send(&self, msg: BusMessage) -> Result<(), BusError> {
        let endpoint = self.lookup(&msg.dst)?;
        endpoint.on_message(msg);
        Ok(())
    }

    fn send_request(&self, msg: BusMessage) -> Result<BusMessage, BusError> {
        let dst = msg.dst.clone();
        let endpoint = self.lookup(&dst)?;
        endpoint.on_request(msg).ok_or(BusError::NoResponse(dst))
    }
}

impl std::fmt::Debug for LocalBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.endpoints.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("LocalBus").field("endpoints", &names).finish()
    }
}

/// Sends every frame back to the connection it came from and answers HTTP
/// requests with their own body.
pub struct EchoEndpoint {
    name: String,
    bus: Weak<LocalBus>,
}

impl EchoEndpoint {
    pub fn new(name: impl Into<String>, bus: &Arc<LocalBus>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            bus: Arc::downgrade(bus),
        })
    }
}

impl Endpoint for EchoEndpoint {
    fn on_message(&self, msg: BusMessage) {
        if msg.kind != MessageKind::WebSocket {
            tracing::debug!(kind = %msg.kind, "Echo ignoring message");
            return;
        }
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let reply = BusMessage::new(MessageKind::WebSocket)
            .with_src(self.name.as_str())
            .with_dst(msg.src)
            .with_data(msg.data)
            .with_any(msg.any);
        if let Err(e) = bus.send(reply) {
            tracing::warn!(endpoint = %self.name, error = %e, "Echo reply undeliverable");
        }
    }

    fn on_request(&self, msg: BusMessage) -> Option<BusMessage> {
        if msg.kind != MessageKind::Http {
            return None;
        }
        let response = match msg.http_request() {
            Ok(req) => HttpResponse::new(200, req.body.clone()),
            // Raw requests carry the JSON envelope in `data`.
            Err(_) => HttpResponse::new(200, msg.data.clone()),
        };
        Some(
            BusMessage::new(MessageKind::Http)
                .with_src(self.name.as_str())
                .with_dst(msg.src)
                .with_any(AnyData::HttpResponse(Arc::new(response))),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::net::ConnectionId;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<BusMessage>>,
    }

    impl Endpoint for Recorder {
        fn on_message(&self, msg: BusMessage) {
            self.seen.lock().unwrap().push(msg);
        }
    }

    #[test]
    fn routes_by_name() {
        let bus = LocalBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.register("rec", recorder.clone());

        bus.send(BusMessage::new(MessageKind::WebSocket).with_dst("rec")).unwrap();
        assert_eq!(recorder.seen.lock().unwrap().len(), 1);

        let err = bus.send(BusMessage::new(MessageKind::WebSocket).with_dst("nobody")).unwrap_err();
        assert_eq!(err, BusError::UnknownDestination("nobody".into()));

        assert!(bus.unregister("rec"));
        assert!(!bus.contains("rec"));
    }

    #[test]
    fn request_without_answer_is_an_error() {
        let bus = LocalBus::new();
        bus.register("rec", Arc::new(Recorder::default()));
        let err = bus.send_request(BusMessage::new(MessageKind::Http).with_dst("rec")).unwrap_err();
        assert_eq!(err, BusError::NoResponse("rec".into()));
    }

    #[test]
    fn echo_returns_frame_to_sender() {
        let bus = LocalBus::new();
        let recorder = Arc::new(Recorder::default());
        bus.register("gateway", recorder.clone());
        bus.register("echo", EchoEndpoint::new("echo", &bus));

        let id = ConnectionId::new();
        let frame = BusMessage::new(MessageKind::WebSocket)
            .with_src("gateway")
            .with_dst("echo")
            .with_data("hello")
            .with_any(AnyData::Connection(id));
        bus.send(frame).unwrap();

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].src, "echo");
        assert_eq!(seen[0].data.as_ref(), b"hello");
        assert_eq!(seen[0].connection_id().unwrap(), id);
    }

    #[test]
    fn echo_answers_http_with_body() {
        let bus = LocalBus::new();
        bus.register("echo", EchoEndpoint::new("echo", &bus));

        let raw = crate::http::RawHttpRequest {
            uri: "/x".into(),
            method: "POST".into(),
            headers: Vec::new(),
            body: "ping".into(),
        };
        let req = crate::http::translate(raw).unwrap();
        let msg = BusMessage::new(MessageKind::Http)
            .with_src("gateway")
            .with_dst("echo")
            .with_any(AnyData::HttpRequest(Arc::new(req)));

        let reply = bus.send_request(msg).unwrap();
        let resp = reply.http_response().unwrap();
        assert_eq!(resp.status_code, 200);
        assert_eq!(resp.body.as_ref(), b"ping");
    }
}

//! Adapter between gateway callbacks and a [`MessageBus`].

use std::str::FromStr;
use std::sync::{Arc, Weak};

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use crate::bus::local::Endpoint;
use crate::bus::{AnyData, BusMessage, FanOut, MessageBus, MessageKind};
use crate::gateway::{Gateway, GatewayError};
use crate::http::{HttpRequest, HttpResponse, RawHttpResponse};
use crate::net::ConnectionId;

/// Which HTTP handler the bridge installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMode {
    #[default]
    Structured,
    Raw,
}

impl FromStr for HttpMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structured" => Ok(HttpMode::Structured),
            "raw" => Ok(HttpMode::Raw),
            other => Err(format!("unknown http mode '{other}'")),
        }
    }
}

pub struct GatewayBridge {
    name: String,
    gateway: Gateway,
    bus: Arc<dyn MessageBus>,
    fanout: FanOut,
}

impl GatewayBridge {
    /// `name` is this bridge's own address on the bus; replies are sent to it.
    pub fn new(name: impl Into<String>, gateway: Gateway, bus: Arc<dyn MessageBus>, fanout: FanOut) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            gateway,
            bus,
            fanout,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fanout(&self) -> &FanOut {
        &self.fanout
    }

    /// Register the bridge's callbacks on the gateway. Must run before `connect`.
    pub fn install(self: &Arc<Self>, mode: HttpMode) -> Result<(), GatewayError> {
        let weak = Arc::downgrade(self);
        self.gateway.register_message_handler(move |id, payload| {
            if let Some(bridge) = weak.upgrade() {
                bridge.on_frame(id, payload);
            }
        })?;

        let weak: Weak<Self> = Arc::downgrade(self);
        match mode {
            HttpMode::Structured => self
                .gateway
                .register_http_handler(move |req| weak.upgrade().and_then(|bridge| bridge.on_http(req)))?,
            HttpMode::Raw => self.gateway.register_raw_http_handler(move |raw| {
                weak.upgrade().map(|bridge| bridge.on_http_raw(raw)).unwrap_or_default()
            })?,
        }
        tracing::info!(bridge = %self.name, mode = ?mode, "Bridge installed");
        Ok(())
    }

    /// Publish one inbound frame to every destination.
    pub fn on_frame(&self, id: ConnectionId, payload: Bytes) {
        let destinations = self.fanout.destinations();
        if destinations.is_empty() {
            tracing::debug!(connection_id = %id, "No subscribers, frame dropped");
            return;
        }
        for dst in destinations.iter() {
            let msg = BusMessage::new(MessageKind::WebSocket)
                .with_src(self.name.as_str())
                .with_dst(dst.as_str())
                .with_data(payload.clone())
                .with_any(AnyData::Connection(id));
            if let Err(e) = self.bus.send(msg) {
                tracing::warn!(connection_id = %id, dst = %dst, error = %e, "Frame not published");
            }
        }
    }

    /// Forward a structured request; `None` falls back to the default reply.
    pub fn on_http(&self, req: &HttpRequest) -> Option<HttpResponse> {
        let dst = self.request_target()?;
        let msg = BusMessage::new(MessageKind::Http)
            .with_src(self.name.as_str())
            .with_dst(dst.as_str())
            .with_any(AnyData::HttpRequest(Arc::new(req.clone())));
        let reply = self
            .bus
            .send_request(msg)
            .inspect_err(|e| tracing::warn!(dst = %dst, error = %e, "HTTP request not answered"))
            .ok()?;
        match reply.http_response() {
            Ok(resp) => Some(HttpResponse::clone(&resp)),
            Err(e) => {
                tracing::error!(dst = %dst, error = %e, "Unexpected reply to HTTP request");
                None
            }
        }
    }

    /// Forward a JSON-serialized request; returns `{"code", "body"}` JSON or
    /// an empty string.
    pub fn on_http_raw(&self, raw: &str) -> String {
        let Some(dst) = self.request_target() else {
            return String::new();
        };
        let msg = BusMessage::new(MessageKind::Http)
            .with_src(self.name.as_str())
            .with_dst(dst.as_str())
            .with_data(Bytes::copy_from_slice(raw.as_bytes()));
        let reply = match self.bus.send_request(msg) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(dst = %dst, error = %e, "HTTP request not answered");
                return String::new();
            }
        };
        if let Ok(resp) = reply.http_response() {
            return serde_json::to_string(&RawHttpResponse::from(resp.as_ref())).unwrap_or_default();
        }
        String::from_utf8_lossy(&reply.data).into_owned()
    }

    /// Handle a message addressed to the bridge.
    pub fn proc(&self, msg: BusMessage) {
        if msg.kind == MessageKind::Subscribe {
            if self.fanout.subscribe(&msg.src) {
                tracing::info!(subscriber = %msg.src, "Subscriber added");
            } else {
                tracing::debug!(subscriber = %msg.src, "Subscription ignored");
            }
            return;
        }
        let id = match msg.connection_id() {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(src = %msg.src, kind = %msg.kind, error = %e, "Message without connection id");
                return;
            }
        };
        // Failures are already logged and counted by the gateway.
        let _ = self.gateway.send(id, msg.data);
    }

    fn request_target(&self) -> Option<String> {
        let target = self.fanout.request_target();
        if target.is_none() {
            tracing::debug!(bridge = %self.name, "No subscriber for HTTP request");
        }
        target
    }
}

impl Endpoint for GatewayBridge {
    fn on_message(&self, msg: BusMessage) {
        self.proc(msg);
    }
}

impl std::fmt::Debug for GatewayBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBridge")
            .field("name", &self.name)
            .field("fanout", &self.fanout)
            .finish()
    }
}

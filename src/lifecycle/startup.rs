//! Startup orchestration for the binary.
//!
//! Order: gateway options → bus endpoints → bridge callbacks → connect.
//! Listening starts last so traffic only arrives once every endpoint exists.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::bus::{BusMessage, EchoEndpoint, GatewayBridge, LocalBus, MessageBus};
use crate::config::GatewayConfig;
use crate::gateway::{Gateway, GatewayError};

/// Bus address of the bridge.
pub const BRIDGE_ENDPOINT: &str = "gateway";

/// Bus address of the echo endpoint when no `dst_addr` is configured.
pub const DEFAULT_ECHO_ENDPOINT: &str = "echo";

/// A started gateway and the in-process bus behind it.
#[derive(Debug)]
pub struct Running {
    pub gateway: Gateway,
    pub bus: Arc<LocalBus>,
    pub bridge: Arc<GatewayBridge>,
    pub local_addr: SocketAddr,
}

impl Running {
    /// Stop the gateway and detach the bus endpoints, which breaks the
    /// bus ↔ bridge reference cycle.
    pub fn shutdown(&self) -> bool {
        let stopped = self.gateway.shutdown();
        self.bus.unregister(BRIDGE_ENDPOINT);
        stopped
    }
}

/// Build the gateway, its bridge and an echo endpoint, then start listening.
pub fn start(config: &GatewayConfig) -> Result<Running, GatewayError> {
    let gateway = Gateway::new();
    config.apply(&gateway)?;

    let bus = LocalBus::new();
    let bridge = GatewayBridge::new(BRIDGE_ENDPOINT, gateway.clone(), bus.clone(), config.fanout());
    bus.register(BRIDGE_ENDPOINT, bridge.clone());

    let echo_name = config.dst_addr.as_deref().unwrap_or(DEFAULT_ECHO_ENDPOINT);
    bus.register(echo_name, EchoEndpoint::new(echo_name, &bus));
    if config.dst_addr.is_none() {
        // Broadcast mode only learns destinations from subscriptions.
        if let Err(e) = bus.send(BusMessage::subscribe(echo_name, BRIDGE_ENDPOINT)) {
            tracing::error!(error = %e, "Echo endpoint failed to subscribe");
        }
    }

    bridge.install(config.http_mode)?;
    let local_addr = gateway.connect()?;

    Ok(Running {
        gateway,
        bus,
        bridge,
        local_addr,
    })
}

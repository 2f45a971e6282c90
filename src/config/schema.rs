//! Configuration schema definitions.
//!
//! Top-level keys mirror the gateway's option names so a config file reads
//! like the option store it feeds.

use serde::{Deserialize, Serialize};

use crate::bus::{FanOut, HttpMode};
use crate::gateway::{Gateway, GatewayError, NetOption};
use crate::net::TlsProfile;

/// Root configuration for the gateway binary.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listening port. `0` binds an ephemeral port.
    pub server_port: Option<u16>,

    /// PEM certificate chain. TLS is enabled only when both paths are set.
    pub server_ca: Option<String>,

    /// PEM private key matching `server_ca`.
    pub server_key: Option<String>,

    pub server_tls_profile: TlsProfile,

    /// Single bus destination for all traffic. Unset means broadcast to
    /// endpoints that subscribe.
    pub dst_addr: Option<String>,

    pub http_mode: HttpMode,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// `tracing_subscriber::EnvFilter` directive; `RUST_LOG` takes precedence.
    pub log_filter: Option<String>,

    /// Prometheus exporter address, e.g. "127.0.0.1:9100". Disabled when unset.
    pub metrics_address: Option<String>,
}

impl GatewayConfig {
    pub fn fanout(&self) -> FanOut {
        match self.dst_addr.as_deref() {
            Some(dst) => FanOut::unicast(dst),
            None => FanOut::broadcast(),
        }
    }

    /// Push every configured option into `gateway`.
    pub fn apply(&self, gateway: &Gateway) -> Result<(), GatewayError> {
        if let Some(port) = self.server_port {
            gateway.set_option(NetOption::Port, &port.to_string())?;
        }
        if let Some(ca) = self.server_ca.as_deref() {
            gateway.set_option(NetOption::CertificateChainPath, ca)?;
        }
        if let Some(key) = self.server_key.as_deref() {
            gateway.set_option(NetOption::PrivateKeyPath, key)?;
        }
        gateway.set_option(NetOption::TlsProfile, &self.server_tls_profile.to_string())
    }
}

//! Configuration validation.
//!
//! Serde handles syntax; this pass checks the combinations serde cannot.
//! All problems are reported, not just the first.

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("server_port is required")]
    MissingPort,

    #[error("server_ca and server_key must be set together")]
    IncompleteTls,

    #[error("dst_addr must not be empty")]
    EmptyDestination,

    #[error("invalid metrics_address '{0}'")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server_port.is_none() {
        errors.push(ValidationError::MissingPort);
    }

    let is_set = |path: &Option<String>| path.as_deref().is_some_and(|p| !p.is_empty());
    if is_set(&config.server_ca) != is_set(&config.server_key) {
        errors.push(ValidationError::IncompleteTls);
    }

    if config.dst_addr.as_deref().is_some_and(|dst| dst.trim().is_empty()) {
        errors.push(ValidationError::EmptyDestination);
    }

    if let Some(addr) = config.observability.metrics_address.as_deref() {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

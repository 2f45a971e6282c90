//! Errors surfaced through the gateway facade.

use thiserror::Error;

use crate::gateway::options::NetOption;
use crate::net::listener::ListenerError;
use crate::net::{ConnectionId, RegistryError, TlsConfigError};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("unknown option '{0}'")]
    UnknownOption(String),

    #[error("invalid value '{value}' for {option}: {reason}")]
    InvalidOptionValue {
        option: NetOption,
        value: String,
        reason: String,
    },

    #[error("{0} is already set")]
    OptionAlreadySet(NetOption),

    #[error("{0} must be set before connect")]
    MissingOption(NetOption),

    #[error("{0} handler is already registered")]
    HandlerAlreadyRegistered(&'static str),

    #[error("gateway is already started")]
    AlreadyStarted,

    #[error("gateway has been shut down")]
    Stopped,

    #[error(transparent)]
    Tls(#[from] TlsConfigError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("failed to start reactor thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("send to {id} failed: {reason}")]
    SendFailed {
        id: ConnectionId,
        #[source]
        reason: RegistryError,
    },
}

impl GatewayError {
    /// Configuration problems: bad options or TLS material. Fatal at startup.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            GatewayError::UnknownOption(_)
                | GatewayError::InvalidOptionValue { .. }
                | GatewayError::OptionAlreadySet(_)
                | GatewayError::MissingOption(_)
                | GatewayError::Tls(_)
        )
    }
}

//! Server options: string-keyed, write-once, frozen at `connect`.

use std::path::{Path, PathBuf};

use crate::gateway::error::GatewayError;
use crate::net::{TlsConfigError, TlsProfile};

/// Settable options. Keys match the host's configuration store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetOption {
    CertificateChainPath,
    PrivateKeyPath,
    Port,
    TlsProfile,
}

impl NetOption {
    pub const ALL: [NetOption; 4] = [
        NetOption::CertificateChainPath,
        NetOption::PrivateKeyPath,
        NetOption::Port,
        NetOption::TlsProfile,
    ];

    pub fn key(self) -> &'static str {
        match self {
            NetOption::CertificateChainPath => "server_ca",
            NetOption::PrivateKeyPath => "server_key",
            NetOption::Port => "server_port",
            NetOption::TlsProfile => "server_tls_profile",
        }
    }

    pub fn from_key(key: &str) -> Result<Self, GatewayError> {
        Self::ALL
            .into_iter()
            .find(|opt| opt.key() == key)
            .ok_or_else(|| GatewayError::UnknownOption(key.to_string()))
    }
}

impl std::fmt::Display for NetOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Options accumulated before `connect`.
#[derive(Debug, Default, Clone)]
pub struct OptionsBuilder {
    certificate_chain_path: Option<String>,
    private_key_path: Option<String>,
    listen_port: Option<u16>,
    tls_profile: Option<TlsProfile>,
}

impl OptionsBuilder {
    /// Validate and store one option. On error nothing is changed.
    pub fn set(&mut self, opt: NetOption, value: &str) -> Result<(), GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidOptionValue {
            option: opt,
            value: value.to_string(),
            reason,
        };
        match opt {
            NetOption::CertificateChainPath => {
                write_once(&mut self.certificate_chain_path, opt, value.trim().to_string())
            }
            NetOption::PrivateKeyPath => write_once(&mut self.private_key_path, opt, value.trim().to_string()),
            NetOption::Port => {
                let port = value.trim().parse::<u16>().map_err(|e| invalid(e.to_string()))?;
                write_once(&mut self.listen_port, opt, port)
            }
            NetOption::TlsProfile => {
                let profile = value.parse::<TlsProfile>().map_err(invalid)?;
                write_once(&mut self.tls_profile, opt, profile)
            }
        }
    }

    /// Freeze into [`ServerOptions`]. The port is mandatory.
    pub fn build(&self) -> Result<ServerOptions, GatewayError> {
        let listen_port = self.listen_port.ok_or(GatewayError::MissingOption(NetOption::Port))?;
        let non_empty = |v: &Option<String>| v.as_ref().filter(|s| !s.is_empty()).map(PathBuf::from);
        Ok(ServerOptions {
            certificate_chain_path: non_empty(&self.certificate_chain_path),
            private_key_path: non_empty(&self.private_key_path),
            listen_port,
            tls_profile: self.tls_profile.unwrap_or_default(),
        })
    }
}

fn write_once<T>(slot: &mut Option<T>, opt: NetOption, value: T) -> Result<(), GatewayError> {
    if slot.is_some() {
        return Err(GatewayError::OptionAlreadySet(opt));
    }
    *slot = Some(value);
    Ok(())
}

/// Immutable options used by one running gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    pub certificate_chain_path: Option<PathBuf>,
    pub private_key_path: Option<PathBuf>,
    pub listen_port: u16,
    pub tls_profile: TlsProfile,
}

impl ServerOptions {
    /// TLS material, if secure transport was requested.
    ///
    /// Setting only one of the two paths is a configuration error.
    pub fn tls_paths(&self) -> Result<Option<(&Path, &Path)>, TlsConfigError> {
        match (&self.certificate_chain_path, &self.private_key_path) {
            (Some(cert), Some(key)) => Ok(Some((cert.as_path(), key.as_path()))),
            (None, None) => Ok(None),
            _ => Err(TlsConfigError::Incomplete),
        }
    }
}

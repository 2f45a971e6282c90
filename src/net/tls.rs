//! TLS configuration and certificate loading.
//!
//! Legacy protocol versions are never negotiated: rustls implements neither
//! SSLv2/SSLv3 nor TLS 1.0/1.1. Every supported key exchange is ephemeral, so
//! each handshake uses fresh (single-use) DH parameters.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use rustls::crypto::aws_lc_rs;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::version::{TLS12, TLS13};
use rustls::{ServerConfig, SupportedProtocolVersion};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for TLS setup. Always fatal to startup.
#[derive(Debug, Error)]
pub enum TlsConfigError {
    #[error("TLS needs both a certificate chain and a private key")]
    Incomplete,
    #[error("file not found: {}", .0.display())]
    Missing(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),
    #[error("no private key found in {}", .0.display())]
    NoPrivateKey(PathBuf),
    #[error("invalid TLS configuration: {0}")]
    Invalid(#[from] rustls::Error),
}

/// Protocol version profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsProfile {
    /// TLS 1.3 only.
    Modern,
    /// TLS 1.2 and 1.3, for older clients.
    #[default]
    Intermediate,
}

static MODERN: [&SupportedProtocolVersion; 1] = [&TLS13];
static INTERMEDIATE: [&SupportedProtocolVersion; 2] = [&TLS13, &TLS12];

impl TlsProfile {
    fn versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            TlsProfile::Modern => &MODERN,
            TlsProfile::Intermediate => &INTERMEDIATE,
        }
    }
}

impl FromStr for TlsProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "modern" => Ok(TlsProfile::Modern),
            "intermediate" | "compat" | "compatibility" => Ok(TlsProfile::Intermediate),
            other => Err(format!("unknown TLS profile '{other}'")),
        }
    }
}

impl std::fmt::Display for TlsProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TlsProfile::Modern => f.write_str("modern"),
            TlsProfile::Intermediate => f.write_str("intermediate"),
        }
    }
}

/// Build a server TLS config from PEM certificate chain and key files.
///
/// Fails if either file is missing or unreadable, contains no usable PEM
/// item, or the key does not belong to the leaf certificate.
pub fn build_server_config(
    cert_path: &Path,
    key_path: &Path,
    profile: TlsProfile,
) -> Result<Arc<ServerConfig>, TlsConfigError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let provider = Arc::new(aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(profile.versions())?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    tracing::info!(
        cert = %cert_path.display(),
        profile = %profile,
        "TLS context ready"
    );
    Ok(Arc::new(config))
}

fn read_file(path: &Path) -> Result<Vec<u8>, TlsConfigError> {
    if !path.exists() {
        return Err(TlsConfigError::Missing(path.to_path_buf()));
    }
    fs::read(path).map_err(|source| TlsConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsConfigError> {
    let data = read_file(path)?;
    let mut reader = BufReader::new(data.as_slice());
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsConfigError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsConfigError> {
    let data = read_file(path)?;
    let mut reader = BufReader::new(data.as_slice());
    rustls_pemfile::private_key(&mut reader)
        .map_err(|source| TlsConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsConfigError::NoPrivateKey(path.to_path_buf()))
}

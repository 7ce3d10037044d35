//! TLS configuration
//!
//! Builds the mutual-TLS server and client configurations from PEM material.
//! The server requires every client to present a certificate that chains to
//! the configured root(s); identity resolution happens later, in `auth`.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use thiserror::Error;
use tokio_rustls::{TlsAcceptor, TlsConnector};
use x509_parser::prelude::{FromDer, X509Certificate};

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse certificates: {0}")]
    Certificate(String),

    #[error("failed to parse private key: {0}")]
    PrivateKey(String),

    #[error("no certificates found in {0}")]
    Empty(&'static str),

    #[error("client verifier error: {0}")]
    Verifier(String),

    #[error(transparent)]
    Rustls(#[from] rustls::Error),
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

pub fn read_pem(path: &Path) -> Result<Vec<u8>, TlsError> {
    fs::read(path).map_err(|source| TlsError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Parse PEM-encoded certificates.
pub fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    CertificateDer::pem_slice_iter(pem)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Certificate(e.to_string()))
}

/// Parse a PEM-encoded private key.
pub fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>, TlsError> {
    PrivateKeyDer::from_pem_slice(pem).map_err(|e| TlsError::PrivateKey(e.to_string()))
}

fn root_store(roots: &[CertificateDer<'static>]) -> Result<RootCertStore, TlsError> {
    let mut store = RootCertStore::empty();
    for cert in roots {
        store
            .add(cert.clone())
            .map_err(|e| TlsError::Certificate(format!("failed to add CA certificate: {e}")))?;
    }
    Ok(store)
}

fn subject_of(der: &[u8]) -> Option<Vec<u8>> {
    X509Certificate::from_der(der)
        .ok()
        .map(|(_, cert)| cert.subject().as_raw().to_vec())
}

fn issuer_of(der: &[u8]) -> Option<Vec<u8>> {
    X509Certificate::from_der(der)
        .ok()
        .map(|(_, cert)| cert.issuer().as_raw().to_vec())
}

/// Server-side TLS state: the rustls config plus the trusted roots, which are
/// needed again after the handshake to rebuild verified chains.
#[derive(Debug, Clone)]
pub struct ServerTls {
    config: Arc<ServerConfig>,
    roots: Vec<(Vec<u8>, CertificateDer<'static>)>,
}

impl ServerTls {
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8], ca_pem: &[u8]) -> Result<Self, TlsError> {
        let roots = parse_certificates(ca_pem)?;
        if roots.is_empty() {
            return Err(TlsError::Empty("CA certificate"));
        }
        let certs = parse_certificates(cert_pem)?;
        if certs.is_empty() {
            return Err(TlsError::Empty("server certificate"));
        }
        let key = parse_private_key(key_pem)?;

        // Require client certificates (mutual TLS)
        let verifier =
            WebPkiClientVerifier::builder_with_provider(Arc::new(root_store(&roots)?), provider())
                .build()
                .map_err(|e| TlsError::Verifier(e.to_string()))?;

        let mut config = ServerConfig::builder_with_provider(provider())
            .with_safe_default_protocol_versions()?
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?;
        config.alpn_protocols = vec![b"http/1.1".to_vec()];

        let roots = roots
            .into_iter()
            .filter_map(|root| subject_of(root.as_ref()).map(|subject| (subject, root)))
            .collect();

        Ok(Self {
            config: Arc::new(config),
            roots,
        })
    }

    pub fn from_files(cert: &Path, key: &Path, ca: &Path) -> Result<Self, TlsError> {
        Self::from_pem(&read_pem(cert)?, &read_pem(key)?, &read_pem(ca)?)
    }

    pub fn acceptor(&self) -> TlsAcceptor {
        TlsAcceptor::from(self.config.clone())
    }

    /// Rebuild verified chains as `[leaf, root]` for each trusted root that
    /// issued the client's leaf. Any intermediates or CA copies the client
    /// sent along with the leaf are ignored.
    pub fn verified_chains(
        &self,
        presented: &[CertificateDer<'static>],
    ) -> Vec<Vec<CertificateDer<'static>>> {
        let Some(leaf) = presented.first() else {
            return Vec::new();
        };
        let Some(issuer) = issuer_of(leaf.as_ref()) else {
            return Vec::new();
        };
        self.roots
            .iter()
            .filter(|(subject, _)| *subject == issuer)
            .map(|(_, root)| vec![leaf.clone(), root.clone()])
            .collect()
    }
}

/// Client-side configuration: trust `ca_pem`, authenticate with the given
/// certificate and key.
pub fn client_config(
    ca_pem: &[u8],
    cert_pem: &[u8],
    key_pem: &[u8],
) -> Result<Arc<ClientConfig>, TlsError> {
    let roots = parse_certificates(ca_pem)?;
    if roots.is_empty() {
        return Err(TlsError::Empty("CA certificate"));
    }
    let certs = parse_certificates(cert_pem)?;
    if certs.is_empty() {
        return Err(TlsError::Empty("client certificate"));
    }
    let key = parse_private_key(key_pem)?;

    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()?
        .with_root_certificates(root_store(&roots)?)
        .with_client_auth_cert(certs, key)?;
    Ok(Arc::new(config))
}

pub fn connector(config: Arc<ClientConfig>) -> TlsConnector {
    TlsConnector::from(config)
}

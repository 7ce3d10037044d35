//! Authenticator
//!
//! Maps a transport-verified certificate chain onto a configured identity.
//! Trust and signature checks have already happened in the TLS layer; this
//! module only extracts the leaf's serial number and subject common name and
//! compares them with the identity store.

use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use thiserror::Error;
use tracing::debug;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::auth::identity::{Fingerprint, Identity, IdentityStore};

/// Chains are expected as `[client leaf, signing CA]`.
pub const VERIFIED_CHAIN_LEN: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no verified client certificate chain")]
    NoCredential,

    #[error("unparseable client certificate: {0}")]
    BadCertificate(String),

    #[error("certificate is blacklisted (serial={0})")]
    Blacklisted(Fingerprint),

    #[error("no user for certificate {fingerprint} (cn={common_name:?})")]
    UnknownIdentity {
        fingerprint: Fingerprint,
        common_name: Option<String>,
    },
}

/// The fields of a leaf certificate that identify its holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub fingerprint: Fingerprint,
    pub common_name: Option<String>,
}

impl Credential {
    pub fn from_der(der: &[u8]) -> Result<Self, AuthError> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| AuthError::BadCertificate(e.to_string()))?;
        let fingerprint = Fingerprint::from_serial_bytes(cert.tbs_certificate.raw_serial());
        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .map(str::to_string);
        Ok(Self {
            fingerprint,
            common_name,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Authenticator {
    identities: Arc<IdentityStore>,
}

impl Authenticator {
    pub fn new(identities: Arc<IdentityStore>) -> Self {
        Self { identities }
    }

    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    /// Resolve the first well-formed chain. Chains of any other length are
    /// skipped.
    pub fn authenticate(&self, chains: &[Vec<CertificateDer<'_>>]) -> Result<&Identity, AuthError> {
        let leaf = chains
            .iter()
            .find(|chain| {
                let ok = chain.len() == VERIFIED_CHAIN_LEN;
                if !ok {
                    debug!(
                        "Expected verified chain of length {VERIFIED_CHAIN_LEN}. Skipping chain of length {}",
                        chain.len()
                    );
                }
                ok
            })
            .map(|chain| &chain[0])
            .ok_or(AuthError::NoCredential)?;

        let credential = Credential::from_der(leaf.as_ref())?;
        self.resolve(&credential)
    }

    /// Revocation is checked before, and independently of, the lookup.
    pub fn resolve(&self, credential: &Credential) -> Result<&Identity, AuthError> {
        if self.identities.is_revoked(&credential.fingerprint) {
            return Err(AuthError::Blacklisted(credential.fingerprint.clone()));
        }

        credential
            .common_name
            .as_deref()
            .and_then(|cn| self.identities.lookup(&credential.fingerprint, cn))
            .ok_or_else(|| AuthError::UnknownIdentity {
                fingerprint: credential.fingerprint.clone(),
                common_name: credential.common_name.clone(),
            })
    }
}

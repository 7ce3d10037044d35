//! Identities and the static identity store
//!
//! Identities are loaded once at startup and never change afterwards, so the
//! store is shared by reference (`Arc`) between handlers without locking.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

use crate::broker::dispatcher::Operation;
use crate::broker::topic::Topic;

/// Lowercase hex encoding of a certificate serial number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FingerprintError {
    #[error("encountered empty serial number string")]
    Empty,

    #[error("invalid hex string: {0:?}")]
    InvalidHex(String),
}

impl Fingerprint {
    /// Parse a configured serial. It must be non-empty, even-length hex.
    /// Leading `00` bytes are dropped, as in `from_serial_bytes`, so a serial
    /// copied with its DER sign padding still matches the certificate.
    pub fn parse(serial: &str) -> Result<Self, FingerprintError> {
        let serial = serial.trim();
        if serial.is_empty() {
            return Err(FingerprintError::Empty);
        }
        if serial.len() % 2 != 0 || !serial.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(FingerprintError::InvalidHex(serial.to_string()));
        }
        let mut hex = serial;
        while let Some(rest) = hex.strip_prefix("00") {
            hex = rest;
        }
        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Encode a raw DER serial. Leading zero bytes (DER sign padding) are
    /// dropped so the result matches the serial's minimal big-endian form.
    pub fn from_serial_bytes(raw: &[u8]) -> Self {
        let start = raw.iter().position(|b| *b != 0).unwrap_or(raw.len());
        let hex = raw[start..].iter().map(|b| format!("{b:02x}")).collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Identity {
    name: String,
    fingerprint: Fingerprint,
    read_topics: HashSet<Topic>,
    write_topics: HashSet<Topic>,
}

impl Identity {
    pub fn new(
        name: impl Into<String>,
        fingerprint: Fingerprint,
        read_topics: impl IntoIterator<Item = Topic>,
        write_topics: impl IntoIterator<Item = Topic>,
    ) -> Self {
        Self {
            name: name.into(),
            fingerprint,
            read_topics: read_topics.into_iter().collect(),
            write_topics: write_topics.into_iter().collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn can_read(&self, topic: &Topic) -> bool {
        self.read_topics.contains(topic)
    }

    pub fn can_write(&self, topic: &Topic) -> bool {
        self.write_topics.contains(topic)
    }

    pub fn permits(&self, operation: Operation, topic: &Topic) -> bool {
        match operation {
            Operation::Produce => self.can_write(topic),
            Operation::Consume => self.can_read(topic),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("duplicate user name detected: {0}")]
    DuplicateName(String),

    #[error("duplicate certificate serial number detected: {0}")]
    DuplicateSerial(String),
}

/// Declared identities plus the revocation set.
#[derive(Debug, Default)]
pub struct IdentityStore {
    by_fingerprint: HashMap<Fingerprint, Identity>,
    revoked: HashSet<Fingerprint>,
}

impl IdentityStore {
    /// Build the store. Names and fingerprints must be unique. An identity
    /// may also appear in `revoked`; it will then never authenticate.
    pub fn new(
        identities: impl IntoIterator<Item = Identity>,
        revoked: impl IntoIterator<Item = Fingerprint>,
    ) -> Result<Self, IdentityError> {
        let mut names = HashSet::new();
        let mut by_fingerprint = HashMap::new();
        for identity in identities {
            if !names.insert(identity.name.clone()) {
                return Err(IdentityError::DuplicateName(identity.name));
            }
            if by_fingerprint.contains_key(&identity.fingerprint) {
                return Err(IdentityError::DuplicateSerial(identity.fingerprint.0));
            }
            by_fingerprint.insert(identity.fingerprint.clone(), identity);
        }
        Ok(Self {
            by_fingerprint,
            revoked: revoked.into_iter().collect(),
        })
    }

    pub fn is_revoked(&self, fingerprint: &Fingerprint) -> bool {
        self.revoked.contains(fingerprint)
    }

    /// Identity whose fingerprint and name both match.
    pub fn lookup(&self, fingerprint: &Fingerprint, common_name: &str) -> Option<&Identity> {
        self.by_fingerprint
            .get(fingerprint)
            .filter(|identity| identity.name == common_name)
    }

    pub fn len(&self) -> usize {
        self.by_fingerprint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_fingerprint.is_empty()
    }
}

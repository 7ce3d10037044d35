mod settings;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use thiserror::Error;

use crate::auth::{Fingerprint, FingerprintError, Identity, IdentityError, IdentityStore};
use crate::broker::topic::{Topic, TopicError};

pub use settings::{
    BrokerSettings, ClientSettings, IdentitySettings, LoggingSettings, PartialSettings,
    ServerSettings, Settings,
};

/// File loaded when no explicit path is given. The extension is optional.
pub const DEFAULT_CONFIG: &str = "config/default";

/// Environment variables override file values, e.g.
/// `SKULLSUP_BROKER__MAX_DEPTH=32`.
pub const ENV_PREFIX: &str = "SKULLSUP";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Source(#[from] config::ConfigError),

    #[error("{0}")]
    Invalid(String),

    #[error("serial for identity {name:?}: {source}")]
    Serial {
        name: String,
        source: FingerprintError,
    },

    #[error("revocation list: {0}")]
    RevokedSerial(FingerprintError),

    #[error("topic for identity {name:?}: {source}")]
    Topic { name: String, source: TopicError },

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("certificate for user {name:?} is blacklisted: {serial}")]
    RevokedIdentity { name: String, serial: Fingerprint },

    #[error("missing required setting {0}")]
    Missing(&'static str),
}

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values and validates it
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(None)
}

/// Like `load_config`, but reads `path` (which must exist) instead of the
/// optional default file.
pub fn load_config_from(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG).required(false),
    };

    let builder = Config::builder().add_source(file).add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    let settings = partial.merge();
    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Startup checks. Any failure here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let broker = &self.broker;
        if broker.max_topics == 0 || broker.max_depth == 0 || broker.max_payload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "broker limits must all be at least 1".to_string(),
            ));
        }
        self.identity_store().map(|_| ())
    }

    pub fn revoked_fingerprints(&self) -> Result<HashSet<Fingerprint>, ConfigError> {
        self.revoked
            .iter()
            .map(|serial| Fingerprint::parse(serial).map_err(ConfigError::RevokedSerial))
            .collect()
    }

    /// Build the identity store. Unlike `IdentityStore::new`, an identity
    /// whose serial is also revoked is a configuration error here.
    pub fn identity_store(&self) -> Result<IdentityStore, ConfigError> {
        let revoked = self.revoked_fingerprints()?;
        let mut identities = Vec::with_capacity(self.identities.len());

        for entry in &self.identities {
            let identity = entry.to_identity()?;
            if revoked.contains(identity.fingerprint()) {
                return Err(ConfigError::RevokedIdentity {
                    name: entry.name.clone(),
                    serial: identity.fingerprint().clone(),
                });
            }
            identities.push(identity);
        }

        Ok(IdentityStore::new(identities, revoked)?)
    }
}

impl IdentitySettings {
    pub fn to_identity(&self) -> Result<Identity, ConfigError> {
        let fingerprint = Fingerprint::parse(&self.cert_serial).map_err(|source| {
            ConfigError::Serial {
                name: self.name.clone(),
                source,
            }
        })?;
        let parse_all = |topics: &[String]| -> Result<Vec<Topic>, ConfigError> {
            topics
                .iter()
                .map(|t| {
                    Topic::parse(t).map_err(|source| ConfigError::Topic {
                        name: self.name.clone(),
                        source,
                    })
                })
                .collect()
        };
        Ok(Identity::new(
            self.name.clone(),
            fingerprint,
            parse_all(&self.read_topics)?,
            parse_all(&self.write_topics)?,
        ))
    }
}

/// Unwrap an optional path setting, naming it in the error.
pub fn require_path<'a>(
    value: &'a Option<PathBuf>,
    name: &'static str,
) -> Result<&'a Path, ConfigError> {
    value.as_deref().ok_or(ConfigError::Missing(name))
}

#[cfg(test)]
mod tests;

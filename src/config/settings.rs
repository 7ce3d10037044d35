use std::path::PathBuf;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Covers the TLS listener, the broker caps, logging, the static identity
/// list with its revocation set, and the settings used by the client side.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
    pub client: ClientSettings,
    pub revoked: Vec<String>,
    pub identities: Vec<IdentitySettings>,
}

/// Configuration settings for the server.
///
/// Defines the bind address and the TLS material: the server's own
/// certificate and key, and the root CA that client certificates must chain to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
}

/// Configuration settings for the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub max_topics: usize,
    pub max_depth: usize,
    pub max_payload_bytes: usize,
}

/// Log level and destination.
///
/// `path` is `stdout`, `stderr`, a file opened for append, or empty to
/// discard log output.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
    pub path: String,
}

/// Settings for the producer/consumer client.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub host: String,
    pub port: u16,
    pub ca_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub poll_period_secs: u64,
}

/// One declared identity, as written in the configuration file.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct IdentitySettings {
    pub name: String,
    pub cert_serial: String,
    #[serde(default)]
    pub read_topics: Vec<String>,
    #[serde(default)]
    pub write_topics: Vec<String>,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize, Default)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
    pub client: Option<PartialClientSettings>,
    pub revoked: Option<Vec<String>>,
    pub identities: Option<Vec<IdentitySettings>>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub ca_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialBrokerSettings {
    pub max_topics: Option<usize>,
    pub max_depth: Option<usize>,
    pub max_payload_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct PartialClientSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub ca_path: Option<PathBuf>,
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    pub poll_period_secs: Option<u64>,
}

impl PartialSettings {
    /// Fill every missing value from `Settings::default()`.
    pub fn merge(self) -> Settings {
        let default = Settings::default();
        let server = self.server.unwrap_or_default();
        let broker = self.broker.unwrap_or_default();
        let logging = self.logging.unwrap_or_default();
        let client = self.client.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(default.server.host),
                port: server.port.unwrap_or(default.server.port),
                cert_path: server.cert_path.or(default.server.cert_path),
                key_path: server.key_path.or(default.server.key_path),
                ca_path: server.ca_path.or(default.server.ca_path),
            },
            broker: BrokerSettings {
                max_topics: broker.max_topics.unwrap_or(default.broker.max_topics),
                max_depth: broker.max_depth.unwrap_or(default.broker.max_depth),
                max_payload_bytes: broker
                    .max_payload_bytes
                    .unwrap_or(default.broker.max_payload_bytes),
            },
            logging: LoggingSettings {
                level: logging.level.unwrap_or(default.logging.level),
                path: logging.path.unwrap_or(default.logging.path),
            },
            client: ClientSettings {
                host: client.host.unwrap_or(default.client.host),
                port: client.port.unwrap_or(default.client.port),
                ca_path: client.ca_path.or(default.client.ca_path),
                cert_path: client.cert_path.or(default.client.cert_path),
                key_path: client.key_path.or(default.client.key_path),
                poll_period_secs: client
                    .poll_period_secs
                    .filter(|secs| *secs > 0)
                    .unwrap_or(default.client.poll_period_secs),
            },
            revoked: self.revoked.unwrap_or(default.revoked),
            identities: self.identities.unwrap_or(default.identities),
        }
    }
}

/// Provides default values for `Settings`.
///
/// Broker caps default to ten topics of sixteen messages and a 16 KiB payload bound.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "0.0.0.0".to_string(),
                port: 8443,
                cert_path: None,
                key_path: None,
                ca_path: None,
            },
            broker: BrokerSettings {
                max_topics: 10,
                max_depth: 16,
                max_payload_bytes: 16 * 1024,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                path: "stderr".to_string(),
            },
            client: ClientSettings {
                host: "127.0.0.1".to_string(),
                port: 8443,
                ca_path: None,
                cert_path: None,
                key_path: None,
                poll_period_secs: 15,
            },
            revoked: Vec::new(),
            identities: Vec::new(),
        }
    }
}

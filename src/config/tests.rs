use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::settings::{IdentitySettings, PartialSettings, Settings};
use super::{ConfigError, load_config_from};
use crate::auth::Fingerprint;

const TOPIC_A: &str = "7c9e6679-7425-40de-944b-e07fc1f90ae7";
const TOPIC_B: &str = "1b4e28ba-2fa1-41d2-883f-0016d3cca427";

fn write_config(contents: &str) -> (TempDir, std::path::PathBuf) {
    let tmp = TempDir::new().expect("create tempdir");
    let path = tmp.path().join("server.toml");
    fs::write(&path, contents).expect("write config file");
    (tmp, path)
}

fn entry(name: &str, serial: &str) -> IdentitySettings {
    IdentitySettings {
        name: name.to_string(),
        cert_serial: serial.to_string(),
        read_topics: vec![TOPIC_A.to_string()],
        write_topics: vec![],
    }
}

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "0.0.0.0");
    assert_eq!(settings.server.port, 8443);
    assert_eq!(settings.broker.max_topics, 10);
    assert_eq!(settings.broker.max_depth, 16);
    assert_eq!(settings.broker.max_payload_bytes, 16384);
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.logging.path, "stderr");
    assert_eq!(settings.client.poll_period_secs, 15);
    assert!(settings.identities.is_empty());
    assert!(settings.validate().is_ok());
}

#[test]
fn test_partial_settings_merge_with_defaults() {
    let partial = PartialSettings {
        broker: Some(super::settings::PartialBrokerSettings {
            max_depth: Some(4),
            ..Default::default()
        }),
        logging: Some(super::settings::PartialLoggingSettings {
            path: Some(String::new()),
            ..Default::default()
        }),
        client: Some(super::settings::PartialClientSettings {
            poll_period_secs: Some(0),
            ..Default::default()
        }),
        ..Default::default()
    };
    let settings = partial.merge();
    assert_eq!(settings.broker.max_depth, 4);
    assert_eq!(settings.broker.max_topics, 10);
    assert_eq!(settings.client.poll_period_secs, 15);
    assert_eq!(settings.logging.path, "");
    assert_eq!(settings.logging.level, "info");
}

#[test]
fn test_identity_store_normalizes_serials() {
    let settings = Settings {
        identities: vec![entry("consumer", "0A1B")],
        revoked: vec!["FFEE".to_string()],
        ..Settings::default()
    };
    let store = settings.identity_store().unwrap();
    assert!(store.lookup(&Fingerprint::parse("0a1b").unwrap(), "consumer").is_some());
    assert!(store.is_revoked(&Fingerprint::parse("ffee").unwrap()));
}

#[test]
fn test_padded_serials_normalize_at_load() {
    let padded = Settings {
        identities: vec![entry("consumer", "009F01")],
        ..Settings::default()
    };
    let store = padded.identity_store().unwrap();
    assert!(
        store
            .lookup(&Fingerprint::from_serial_bytes(&[0x00, 0x9f, 0x01]), "consumer")
            .is_some()
    );

    let revoked = Settings {
        identities: vec![entry("consumer", "009f01")],
        revoked: vec!["9F01".to_string()],
        ..Settings::default()
    };
    assert!(matches!(
        revoked.validate(),
        Err(ConfigError::RevokedIdentity { .. })
    ));

    let duplicate = Settings {
        identities: vec![entry("consumer", "01"), entry("producer", "0001")],
        ..Settings::default()
    };
    assert!(matches!(duplicate.validate(), Err(ConfigError::Identity(_))));
}

#[test]
fn test_validation_rejects_bad_entries() {
    let bad_serial = Settings {
        identities: vec![entry("consumer", "xyz")],
        ..Settings::default()
    };
    assert!(matches!(bad_serial.validate(), Err(ConfigError::Serial { .. })));

    let mut bad_topic = entry("consumer", "0a1b");
    bad_topic.write_topics = vec!["general".to_string()];
    let bad_topic = Settings {
        identities: vec![bad_topic],
        ..Settings::default()
    };
    assert!(matches!(bad_topic.validate(), Err(ConfigError::Topic { .. })));

    let duplicate = Settings {
        identities: vec![entry("consumer", "0a1b"), entry("consumer", "0c1d")],
        ..Settings::default()
    };
    assert!(matches!(duplicate.validate(), Err(ConfigError::Identity(_))));

    let revoked = Settings {
        identities: vec![entry("consumer", "0a1b")],
        revoked: vec!["0A1B".to_string()],
        ..Settings::default()
    };
    assert!(matches!(
        revoked.validate(),
        Err(ConfigError::RevokedIdentity { .. })
    ));

    let bad_revoked = Settings {
        revoked: vec!["".to_string()],
        ..Settings::default()
    };
    assert!(matches!(
        bad_revoked.validate(),
        Err(ConfigError::RevokedSerial(_))
    ));

    let mut zero_depth = Settings::default();
    zero_depth.broker.max_depth = 0;
    assert!(matches!(zero_depth.validate(), Err(ConfigError::Invalid(_))));
}

#[test]
#[serial]
fn load_config_from_file_overrides_defaults() {
    let toml = format!(
        r#"
        revoked = ["deadbeef"]

        [server]
        host = "127.0.0.1"
        port = 9443
        cert_path = "/etc/skullsup/server.pem"

        [broker]
        max_topics = 4
        max_depth = 8

        [logging]
        level = "debug"
        path = "/var/log/skullsup.log"

        [[identities]]
        name = "producer"
        cert_serial = "01AA"
        write_topics = ["{TOPIC_A}"]

        [[identities]]
        name = "consumer"
        cert_serial = "02bb"
        read_topics = ["{TOPIC_A}", "{TOPIC_B}"]
        "#
    );
    let (_tmp, path) = write_config(&toml);

    let cfg = load_config_from(Some(&path)).expect("load_config failed");
    assert_eq!(cfg.server.host, "127.0.0.1");
    assert_eq!(cfg.server.port, 9443);
    assert_eq!(
        cfg.server.cert_path.as_deref(),
        Some(std::path::Path::new("/etc/skullsup/server.pem"))
    );
    assert_eq!(cfg.server.key_path, None);
    assert_eq!(cfg.broker.max_topics, 4);
    assert_eq!(cfg.broker.max_depth, 8);
    assert_eq!(cfg.broker.max_payload_bytes, 16384);
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.logging.path, "/var/log/skullsup.log");
    assert_eq!(cfg.revoked, vec!["deadbeef".to_string()]);
    assert_eq!(cfg.identities.len(), 2);
    assert_eq!(cfg.identities[1].read_topics.len(), 2);
    assert!(cfg.identities[1].write_topics.is_empty());
    assert_eq!(cfg.identity_store().unwrap().len(), 2);
}

#[test]
#[serial]
fn load_config_env_overrides_file() {
    let (_tmp, path) = write_config("[broker]\nmax_depth = 8\n");

    temp_env::with_vars(
        [
            ("SKULLSUP_BROKER__MAX_DEPTH", Some("32")),
            ("SKULLSUP_SERVER__PORT", Some("10443")),
        ],
        || {
            let cfg = load_config_from(Some(&path)).expect("load_config failed");
            assert_eq!(cfg.broker.max_depth, 32);
            assert_eq!(cfg.server.port, 10443);
            assert_eq!(cfg.broker.max_topics, 10);
        },
    );
}

#[test]
#[serial]
fn load_config_rejects_revoked_identity() {
    let toml = format!(
        r#"
        revoked = ["01aa"]

        [[identities]]
        name = "producer"
        cert_serial = "01AA"
        write_topics = ["{TOPIC_A}"]
        "#
    );
    let (_tmp, path) = write_config(&toml);
    assert!(matches!(
        load_config_from(Some(&path)),
        Err(ConfigError::RevokedIdentity { .. })
    ));
}

#[test]
#[serial]
fn load_config_missing_explicit_file_fails() {
    let tmp = TempDir::new().expect("create tempdir");
    let missing = tmp.path().join("nope.toml");
    assert!(matches!(
        load_config_from(Some(&missing)),
        Err(ConfigError::Source(_))
    ));
}

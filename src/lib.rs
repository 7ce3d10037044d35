//! # SkullsUp
//!
//! `skullsup` is a small, capacity-bounded mailbox broker. Remote producers
//! deposit short device commands into named mailboxes over mutually
//! authenticated HTTPS, and an authorized consumer later polls them out and
//! relays them to the device.
//!
//! ## Core Modules
//!
//! - `auth`: Resolves verified client certificates into configured identities and their topic ACLs.
//! - `broker`: The bounded mailbox store and the dispatcher that enforces access control in front of it.
//! - `client`: Producer/consumer client for the mailbox protocol.
//! - `config`: Loads, merges and validates configuration.
//! - `transport`: TLS setup and the HTTPS listener.
//! - `utils`: Shared utilities such as the top-level error type and logging.

pub mod auth;
pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::broker::{Broker, Dispatcher};
use crate::config::{Settings, require_path};
use crate::transport::{RelayServer, ServerTls};
use crate::utils::error::RelayError;

/// Wire a server together from validated settings: TLS material, identity
/// store, broker and listener. Every failure here is a startup failure.
pub async fn build_server(settings: &Settings) -> Result<RelayServer, RelayError> {
    let tls = ServerTls::from_files(
        require_path(&settings.server.cert_path, "server.cert_path")?,
        require_path(&settings.server.key_path, "server.key_path")?,
        require_path(&settings.server.ca_path, "server.ca_path")?,
    )?;

    let identities = settings.identity_store()?;
    tracing::info!(
        "Loaded {} identities, {} revoked serials",
        identities.len(),
        settings.revoked.len()
    );
    let authenticator = Authenticator::new(Arc::new(identities));

    let broker = Broker::from_settings(&settings.broker).shared();
    let dispatcher = Dispatcher::new(broker, settings.broker.max_payload_bytes);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    Ok(RelayServer::bind(&addr, tls, authenticator, dispatcher).await?)
}

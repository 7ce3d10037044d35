//! The `error` module defines the top-level error type used by the
//! `skullsup` binary.
//!
//! Each subsystem keeps its own error enum; `RelayError` only aggregates the
//! ones that can abort a command. Errors raised while handling a single
//! request never reach this type, they are turned into replies instead.

use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::transport::TlsError;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("tls setup failed: {0}")]
    Tls(#[from] TlsError),

    #[error("client request failed: {0}")]
    Client(#[from] ClientError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Invalid(String),
}

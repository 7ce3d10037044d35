//! The `transport` module is responsible for handling network communication
//! with clients over mutually authenticated HTTPS.
//!
//! It builds the TLS configurations, runs the listener, authenticates each
//! connection and forwards requests to the dispatcher.

pub mod server;
pub mod tls;

pub use server::{QUEUE_ENDPOINT, RelayServer, queue_path, render, topic_from_path};
pub use tls::{ServerTls, TlsError};

#[cfg(test)]
mod tests;

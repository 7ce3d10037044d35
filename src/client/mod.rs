//! The `client` module implements the producer and consumer side of the
//! mailbox protocol.
//!
//! It provides `RelayClient`, which writes commands into a topic's mailbox
//! and reads (or polls for) pending commands from it.

pub mod relay_client;
pub use relay_client::{ClientError, RelayClient};

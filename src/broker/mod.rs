//! The `broker` module holds the mailbox store and the request dispatcher
//! that drives it.

pub mod dispatcher;
pub mod engine;
pub mod message;
pub mod store;
pub mod topic;

pub use dispatcher::{Dispatcher, Grant, Operation, Reply};
pub use engine::{Broker, SharedBroker};
pub use message::{Command, Message};
pub use store::{MailboxStore, StoreError};
pub use topic::{Topic, TopicError};

//! Request dispatcher
//!
//! Turns an authenticated request into a mailbox operation. Authorization is
//! a separate step (`authorize`) that yields a `Grant`; the transport reads
//! the request body only once it holds one. Every path ends in a `Reply`,
//! the transport maps those onto status codes.
//!
//! All authorization failures collapse into `Reply::Forbidden` so a caller
//! cannot tell a malformed topic from a topic it simply may not use. The
//! specific reason is logged server-side.

use tracing::{debug, error, info, warn};

use crate::auth::Identity;
use crate::broker::engine::{self, SharedBroker, Transition};
use crate::broker::message::{Message, MessageError};
use crate::broker::store::StoreError;
use crate::broker::topic::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Produce,
    Consume,
}

impl Operation {
    fn as_str(&self) -> &'static str {
        match self {
            Operation::Produce => "produce",
            Operation::Consume => "consume",
        }
    }
}

/// Outcome of one request, independent of the wire encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Accepted,
    Delivered(Vec<u8>),
    Forbidden,
    Malformed(String),
    TooLarge,
    MethodNotAllowed,
    Full,
    Empty,
    Internal,
}

/// Proof that `source` may perform `operation` on `topic`.
#[derive(Debug, Clone)]
pub struct Grant {
    topic: Topic,
    operation: Operation,
    source: String,
}

impl Grant {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct Dispatcher {
    broker: SharedBroker,
    max_payload_bytes: usize,
}

impl Dispatcher {
    pub fn new(broker: SharedBroker, max_payload_bytes: usize) -> Self {
        Self {
            broker,
            max_payload_bytes,
        }
    }

    pub fn broker(&self) -> &SharedBroker {
        &self.broker
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    /// Check identity, topic format and ACL. `peer` is only used for logs.
    pub fn authorize(
        &self,
        identity: Option<&Identity>,
        topic: &str,
        operation: Operation,
        peer: &str,
    ) -> Result<Grant, Reply> {
        let Some(identity) = identity else {
            warn!("Auth failure from {peer}: no identity resolved");
            return Err(Reply::Forbidden);
        };
        let source = format!("{}@{} <{}>", identity.name(), peer, identity.fingerprint());

        let topic = match Topic::parse(topic) {
            Ok(topic) => topic,
            Err(e) => {
                warn!("Auth failure from {source}: {e}");
                return Err(Reply::Forbidden);
            }
        };

        if !identity.permits(operation, &topic) {
            warn!(
                "Auth failure from {source}: no {} access to {topic}",
                operation.as_str()
            );
            return Err(Reply::Forbidden);
        }

        debug!("Authorized {} on {topic} for {source}", operation.as_str());
        Ok(Grant {
            topic,
            operation,
            source,
        })
    }

    /// Reject a declared body length over the payload bound before any of
    /// the body is read.
    pub fn check_length(&self, grant: &Grant, declared: u64) -> Result<(), Reply> {
        if declared > self.max_payload_bytes as u64 {
            warn!(
                "Excessively large request ({declared} bytes) from {}",
                grant.source
            );
            return Err(Reply::TooLarge);
        }
        Ok(())
    }

    pub fn produce(&self, grant: &Grant, body: &[u8]) -> Reply {
        if grant.operation != Operation::Produce {
            error!("Produce attempted with a {} grant", grant.operation.as_str());
            return Reply::Forbidden;
        }
        if let Err(reply) = self.check_length(grant, body.len() as u64) {
            return reply;
        }

        let message = match Message::from_slice(body) {
            Ok(message) => message,
            Err(e) => {
                warn!("Received invalid message from {}: {e}", grant.source);
                return Reply::Malformed(malformed_reason(&e));
            }
        };
        let shown = message.to_string();

        let outcome = engine::lock(&self.broker).enqueue(&grant.topic, message);
        log_transition("full", "enqueue", &grant.source, outcome.transition);

        match outcome.result {
            Ok(()) => {
                debug!("Enqueued message from {}: {shown}", grant.source);
                Reply::Accepted
            }
            Err(StoreError::Full) | Err(StoreError::Empty) => Reply::Full,
        }
    }

    pub fn consume(&self, grant: &Grant) -> Reply {
        if grant.operation != Operation::Consume {
            error!("Consume attempted with a {} grant", grant.operation.as_str());
            return Reply::Forbidden;
        }

        let outcome = engine::lock(&self.broker).dequeue(&grant.topic);
        log_transition("empty", "dequeue", &grant.source, outcome.transition);

        let message = match outcome.result {
            Ok(message) => message,
            Err(StoreError::Empty) | Err(StoreError::Full) => return Reply::Empty,
        };

        match message.to_json() {
            Ok(body) => {
                debug!("Dequeued message for {}: {message}", grant.source);
                Reply::Delivered(body)
            }
            Err(e) => {
                // The message has already left the store and is lost.
                error!("Failed to serialize message {message} for {}: {e}", grant.source);
                Reply::Internal
            }
        }
    }

    /// Authorize and run one request in a single call.
    pub fn dispatch(
        &self,
        identity: Option<&Identity>,
        topic: &str,
        operation: Operation,
        body: &[u8],
        peer: &str,
    ) -> Reply {
        let grant = match self.authorize(identity, topic, operation, peer) {
            Ok(grant) => grant,
            Err(reply) => return reply,
        };
        match operation {
            Operation::Produce => self.produce(&grant, body),
            Operation::Consume => self.consume(&grant),
        }
    }
}

fn malformed_reason(err: &MessageError) -> String {
    match err {
        MessageError::EmptyBody => "empty queue message received".to_string(),
        MessageError::MissingCommand => "message is missing a command".to_string(),
        MessageError::Json(_) => "message is not valid JSON for this queue".to_string(),
    }
}

fn log_transition(condition: &str, action: &str, source: &str, transition: Transition) {
    match transition {
        Transition::Steady => {}
        Transition::Entered => {
            warn!("Queue {condition}. Dropping {action} request(s) from: {source}");
        }
        Transition::Repeated => {
            debug!("Queue {condition}. Dropping {action} request(s) from: {source}");
        }
        Transition::Cleared { since } => {
            let lasted = chrono::Utc::now() - since;
            info!(
                "Queue no longer {condition} after {} ms ({action} from {source})",
                lasted.num_milliseconds()
            );
        }
    }
}

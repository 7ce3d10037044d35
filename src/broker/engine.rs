//! Broker engine
//!
//! `Broker` pairs the mailbox store with the capacity-log state that
//! describes it. Both live behind the same lock (`SharedBroker`), so the
//! suppression flags always agree with the store mutation they describe.
//!
//! Concurrency and usage notes:
//! - The public API is synchronous and designed to be held behind a lock.
//!   Callers should avoid holding the broker lock across network I/O, and
//!   that includes writing log lines: `enqueue`/`dequeue` hand back a
//!   `Transition` which the caller logs after the guard is dropped.
//! - Nothing here blocks waiting for space or data. A full mailbox fails
//!   immediately with `Full`, an empty one with `Empty`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::broker::message::Message;
use crate::broker::store::{MailboxStore, StoreError};
use crate::broker::topic::Topic;
use crate::config::BrokerSettings;

pub type SharedBroker = Arc<Mutex<Broker>>;

/// How a store call moved the capacity condition of its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Success while the condition was already clear.
    Steady,
    /// First failure after a success.
    Entered,
    /// Another failure while the condition persists.
    Repeated,
    /// First success after the condition held since the given time.
    Cleared { since: DateTime<Utc> },
}

#[derive(Debug, Default)]
struct CapacityFlag {
    since: Option<DateTime<Utc>>,
}

impl CapacityFlag {
    fn failed(&mut self) -> Transition {
        match self.since {
            Some(_) => Transition::Repeated,
            None => {
                self.since = Some(Utc::now());
                Transition::Entered
            }
        }
    }

    fn succeeded(&mut self) -> Transition {
        match self.since.take() {
            Some(since) => Transition::Cleared { since },
            None => Transition::Steady,
        }
    }
}

#[derive(Debug)]
pub struct Outcome<T> {
    pub result: Result<T, StoreError>,
    pub transition: Transition,
}

#[derive(Debug)]
pub struct Broker {
    store: MailboxStore,
    full: CapacityFlag,
    empty: CapacityFlag,
}

impl Broker {
    pub fn new(max_topics: usize, max_depth: usize) -> Self {
        Self {
            store: MailboxStore::new(max_topics, max_depth),
            full: CapacityFlag::default(),
            empty: CapacityFlag::default(),
        }
    }

    pub fn from_settings(settings: &BrokerSettings) -> Self {
        Self::new(settings.max_topics, settings.max_depth)
    }

    pub fn shared(self) -> SharedBroker {
        Arc::new(Mutex::new(self))
    }

    pub fn enqueue(&mut self, topic: &Topic, message: Message) -> Outcome<()> {
        let result = self.store.enqueue(topic, message);
        let transition = match result {
            Ok(()) => self.full.succeeded(),
            Err(_) => self.full.failed(),
        };
        Outcome { result, transition }
    }

    pub fn dequeue(&mut self, topic: &Topic) -> Outcome<Message> {
        let result = self.store.dequeue(topic);
        let transition = match result {
            Ok(_) => self.empty.succeeded(),
            Err(_) => self.empty.failed(),
        };
        Outcome { result, transition }
    }

    pub fn store(&self) -> &MailboxStore {
        &self.store
    }
}

/// Lock the broker, recovering the guard if another handler panicked while
/// holding it. Store operations leave the maps consistent at every return
/// point, so the data behind a poisoned lock is still sound.
pub fn lock(broker: &SharedBroker) -> MutexGuard<'_, Broker> {
    broker.lock().unwrap_or_else(PoisonError::into_inner)
}

//! Mailbox store
//!
//! Maps each topic to a bounded FIFO of messages. Two caps hold at all
//! times: at most `max_topics` topics are present, and no mailbox holds more
//! than `max_depth` messages. A mailbox exists only while it is non-empty,
//! so the topic count is also the count of non-empty topics.
//!
//! Concurrency note: the store is a plain data structure with `&mut self`
//! operations. The broker keeps it behind a single mutex; callers must not
//! hold that lock across I/O.

use std::collections::{HashMap, VecDeque};

use thiserror::Error;

use crate::broker::message::Message;
use crate::broker::topic::Topic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("mailbox store is full")]
    Full,

    #[error("mailbox is empty")]
    Empty,
}

#[derive(Debug)]
pub struct MailboxStore {
    mailboxes: HashMap<Topic, VecDeque<Message>>,
    max_topics: usize,
    max_depth: usize,
}

impl MailboxStore {
    pub fn new(max_topics: usize, max_depth: usize) -> Self {
        Self {
            mailboxes: HashMap::new(),
            max_topics,
            max_depth,
        }
    }

    /// Append `message` to the back of the topic's mailbox, creating the
    /// mailbox if needed. Fails with `Full` when either cap would be exceeded.
    pub fn enqueue(&mut self, topic: &Topic, message: Message) -> Result<(), StoreError> {
        match self.mailboxes.get_mut(topic) {
            Some(queue) => {
                if queue.len() >= self.max_depth {
                    return Err(StoreError::Full);
                }
                queue.push_back(message);
            }
            None => {
                if self.mailboxes.len() >= self.max_topics || self.max_depth == 0 {
                    return Err(StoreError::Full);
                }
                self.mailboxes
                    .insert(topic.clone(), VecDeque::from([message]));
            }
        }
        Ok(())
    }

    /// Remove and return the oldest message for `topic`. The mailbox entry is
    /// dropped as soon as it drains.
    pub fn dequeue(&mut self, topic: &Topic) -> Result<Message, StoreError> {
        let queue = self.mailboxes.get_mut(topic).ok_or(StoreError::Empty)?;
        let message = queue.pop_front().ok_or(StoreError::Empty)?;
        if queue.is_empty() {
            self.mailboxes.remove(topic);
        }
        Ok(message)
    }

    pub fn depth(&self, topic: &Topic) -> usize {
        self.mailboxes.get(topic).map_or(0, VecDeque::len)
    }

    pub fn topic_count(&self) -> usize {
        self.mailboxes.len()
    }

    pub fn contains(&self, topic: &Topic) -> bool {
        self.mailboxes.contains_key(topic)
    }

    pub fn max_topics(&self) -> usize {
        self.max_topics
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

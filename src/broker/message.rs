//! Message definitions for the broker
//!
//! `Message` is the canonical wire/internal representation of one queued
//! device command. The JSON shape is shared by producers, the broker and the
//! consumer that relays commands to the device.
//!
//! Notes on fields:
//! - `cmd`: command name, must be non-empty
//! - `args`: command arguments, defaults to an empty list
//! - `period`: frame period in milliseconds, defaults to `0`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub cmd: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub period: u64,
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("empty message body")]
    EmptyBody,

    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message is missing a command")]
    MissingCommand,
}

impl Message {
    pub fn new(cmd: impl Into<String>, args: Vec<String>, period: u64) -> Self {
        Self {
            cmd: cmd.into(),
            args,
            period,
        }
    }

    /// Parse a producer payload, rejecting bodies that are empty or carry a
    /// blank command.
    pub fn from_slice(body: &[u8]) -> Result<Self, MessageError> {
        if body.is_empty() {
            return Err(MessageError::EmptyBody);
        }
        let msg: Message = serde_json::from_slice(body)?;
        if msg.cmd.trim().is_empty() {
            return Err(MessageError::MissingCommand);
        }
        Ok(msg)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ {} [{}] ({} ms) }}",
            self.cmd,
            self.args.join(" "),
            self.period
        )
    }
}

/// Commands understood by the device-side consumer.
///
/// The broker stores any well-formed message; producers use this to refuse
/// commands the consumer would drop anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Color,
    Incant,
    Reanimate,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Color => "color",
            Command::Incant => "incant",
            Command::Reanimate => "reanimate",
        }
    }
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "color" => Ok(Command::Color),
            "incant" => Ok(Command::Incant),
            "reanimate" => Ok(Command::Reanimate),
            other => Err(format!("invalid command: {other}")),
        }
    }
}

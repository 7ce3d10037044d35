//! Topic names
//!
//! A topic addresses one mailbox. Names must be hyphenated version-4 UUIDs;
//! they are compared case-insensitively and stored in lowercase so the ACL
//! check, the store key and the config loader all agree on one spelling.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};
use thiserror::Error;
use uuid::{Uuid, Variant};

const HYPHENATED_LEN: usize = 36;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Topic(String);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid topic name: {0:?}")]
pub struct TopicError(pub String);

impl Topic {
    pub fn parse(name: &str) -> Result<Self, TopicError> {
        // Uuid::parse_str also accepts simple, braced and urn forms.
        if name.len() != HYPHENATED_LEN {
            return Err(TopicError(name.to_string()));
        }
        let id = Uuid::parse_str(name).map_err(|_| TopicError(name.to_string()))?;
        if id.get_version_num() != 4 || id.get_variant() != Variant::RFC4122 {
            return Err(TopicError(name.to_string()));
        }
        Ok(Self(id.hyphenated().to_string()))
    }

    /// A fresh random topic name.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Topic {
    type Err = TopicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Topic {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Topic::parse(&raw).map_err(serde::de::Error::custom)
    }
}

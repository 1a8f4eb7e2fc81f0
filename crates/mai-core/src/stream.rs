use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MaiError;

/// Identifier of an interaction stream: one private chat or one group.
///
/// The textual form is `P-<entity id>` for a private chat with an interaction
/// entity and `G-<group id>` for a group. It is stable for the lifetime of the
/// conversation and is used as the primary key of persisted stream records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StreamId {
    /// One-to-one chat with the interaction entity of this id.
    Private(i64),
    /// Group chat with the interaction group of this id.
    Group(i64),
}

impl StreamId {
    pub fn private(entity_id: i64) -> Self {
        StreamId::Private(entity_id)
    }

    pub fn group(group_id: i64) -> Self {
        StreamId::Group(group_id)
    }

    pub fn is_private(&self) -> bool {
        matches!(self, StreamId::Private(_))
    }

    /// The id of the entity or group this stream points at.
    pub fn target_id(&self) -> i64 {
        match self {
            StreamId::Private(id) | StreamId::Group(id) => *id,
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamId::Private(id) => write!(f, "P-{id}"),
            StreamId::Group(id) => write!(f, "G-{id}"),
        }
    }
}

impl FromStr for StreamId {
    type Err = MaiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| MaiError::InvalidReference {
            stream: s.to_string(),
            reason: reason.to_string(),
        };

        let (kind, id) = s
            .split_once('-')
            .ok_or_else(|| invalid("expected '<P|G>-<id>'"))?;
        let id: i64 = id
            .parse()
            .map_err(|_| invalid("target id is not an integer"))?;

        let parsed = match kind {
            "P" => StreamId::Private(id),
            "G" => StreamId::Group(id),
            _ => return Err(invalid("unknown stream kind, expected 'P' or 'G'")),
        };
        // Only the canonical spelling names a stored record.
        if parsed.to_string() != s {
            return Err(invalid("non-canonical id"));
        }
        Ok(parsed)
    }
}

impl TryFrom<String> for StreamId {
    type Error = MaiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StreamId> for String {
    fn from(value: StreamId) -> Self {
        value.to_string()
    }
}

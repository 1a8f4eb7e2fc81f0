use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stream::StreamId;

/// A single item of conversation (a received message) within an interaction stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Row id assigned by storage.
    pub id: i64,
    pub stream: StreamId,
    /// Interaction entity that sent the item.
    pub sender_entity_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ConversationItem {
    /// Create an item that has not been given a storage id yet.
    pub fn new(stream: StreamId, sender_entity_id: i64, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            stream,
            sender_entity_id,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = id;
        self
    }
}

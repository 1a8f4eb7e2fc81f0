use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MaiError, Result};
use crate::item::ConversationItem;
use crate::state::FlowState;
use crate::stream::StreamId;

/// A stream record as it sits in storage, before validation.
///
/// Fields are kept raw so that one unreadable record can be reported and
/// skipped without failing the whole listing.
#[derive(Debug, Clone)]
pub struct StreamRecord {
    pub id: String,
    pub state: Option<String>,
    pub last_active_at: Option<String>,
}

impl StreamRecord {
    pub fn stream_id(&self) -> Result<StreamId> {
        self.id.parse()
    }

    /// Persisted state, or `Dormant` when the stream never recorded one.
    pub fn flow_state(&self) -> Result<FlowState> {
        match self.state.as_deref() {
            None => Ok(FlowState::Dormant),
            Some(s) => s.parse(),
        }
    }

    pub fn last_active(&self) -> Result<Option<DateTime<Utc>>> {
        self.last_active_at
            .as_deref()
            .map(|raw| {
                DateTime::parse_from_rfc3339(raw)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| MaiError::Persistence(format!("bad last_active_at '{raw}': {e}")))
            })
            .transpose()
    }
}

/// State of one flow as flushed to storage at shutdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub stream: StreamId,
    pub state: FlowState,
    pub last_active: DateTime<Utc>,
    /// Window items that have no storage id yet, oldest first.
    pub unsaved: Vec<ConversationItem>,
}

/// Persistence gateway used by the flow registry.
///
/// Every call is one unit of work: implementations wrap it in a transaction
/// and roll back on failure.
pub trait StreamStore: Send + Sync {
    /// All persisted stream records.
    fn load_streams(&self) -> Result<Vec<StreamRecord>>;

    /// The most recent `limit` items of a stream, oldest first.
    fn recent_items(&self, stream: &StreamId, limit: usize) -> Result<Vec<ConversationItem>>;

    /// Persist a new stream record pointing at its person or group.
    ///
    /// Fails with [`MaiError::InvalidReference`] when the target does not exist.
    fn create_stream(&self, stream: &StreamId) -> Result<()>;

    /// Write the current state and activity timestamp of one flow and append
    /// its unsaved items, as one unit of work.
    ///
    /// Returns the storage ids assigned to `snapshot.unsaved`, in order.
    fn save_snapshot(&self, snapshot: &FlowSnapshot) -> Result<Vec<i64>>;
}

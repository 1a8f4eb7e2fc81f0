//! Interaction stream records and their messages.

use chrono::{DateTime, Utc};
use mai_core::{
    ConversationItem, FlowSnapshot, MaiError, Result, StreamId, StreamRecord, StreamStore,
};
use rusqlite::{Transaction, params};
use tracing::{debug, info};

use crate::store::{SqliteStore, db_err, now_rfc3339};

impl SqliteStore {
    /// Append a message to a stream and return it with its storage id.
    pub fn insert_message(
        &self,
        stream: &StreamId,
        sender_entity_id: i64,
        content: &str,
    ) -> Result<ConversationItem> {
        let item = ConversationItem::new(*stream, sender_entity_id, content);
        self.exec(|tx| {
            tx.execute(
                "INSERT INTO message (stream_id, sender_entity_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    stream.to_string(),
                    sender_entity_id,
                    item.content,
                    item.created_at.to_rfc3339()
                ],
            )
            .map_err(db_err)?;
            Ok(item.with_id(tx.last_insert_rowid()))
        })
    }
}

fn target_exists(tx: &Transaction<'_>, stream: &StreamId) -> Result<bool> {
    let sql = match stream {
        StreamId::Private(_) => "SELECT COUNT(*) FROM interaction_entity WHERE id = ?1",
        StreamId::Group(_) => "SELECT COUNT(*) FROM interaction_group WHERE id = ?1",
    };
    let count: i64 = tx
        .query_row(sql, params![stream.target_id()], |row| row.get(0))
        .map_err(db_err)?;
    Ok(count > 0)
}

impl StreamStore for SqliteStore {
    fn load_streams(&self) -> Result<Vec<StreamRecord>> {
        self.exec(|tx| {
            let mut stmt = tx
                .prepare(
                    "SELECT id, state, last_active_at FROM interaction_stream ORDER BY created_at, id",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(StreamRecord {
                        id: row.get(0)?,
                        state: row.get(1)?,
                        last_active_at: row.get(2)?,
                    })
                })
                .map_err(db_err)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)
        })
    }

    fn recent_items(&self, stream: &StreamId, limit: usize) -> Result<Vec<ConversationItem>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let key = stream.to_string();
        let raw = self.exec(|tx| {
            let mut stmt = tx
                .prepare(
                    "SELECT id, sender_entity_id, content, created_at FROM message
                     WHERE stream_id = ?1 ORDER BY id DESC LIMIT ?2",
                )
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![key, limit], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(db_err)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(db_err)
        })?;

        let mut items = raw
            .into_iter()
            .map(|(id, sender_entity_id, content, created_at)| {
                let created_at = DateTime::parse_from_rfc3339(&created_at)
                    .map_err(|e| {
                        MaiError::Persistence(format!(
                            "message {id} of {key} has bad created_at '{created_at}': {e}"
                        ))
                    })?
                    .with_timezone(&Utc);
                Ok(ConversationItem {
                    id,
                    stream: *stream,
                    sender_entity_id,
                    content,
                    created_at,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        items.reverse();
        Ok(items)
    }

    fn create_stream(&self, stream: &StreamId) -> Result<()> {
        self.exec(|tx| {
            if !target_exists(tx, stream)? {
                let kind = if stream.is_private() { "entity" } else { "group" };
                return Err(MaiError::InvalidReference {
                    stream: stream.to_string(),
                    reason: format!("no interaction {kind} with id {}", stream.target_id()),
                });
            }

            let (entity_id, group_id) = match stream {
                StreamId::Private(id) => (Some(*id), None),
                StreamId::Group(id) => (None, Some(*id)),
            };
            let now = now_rfc3339();
            let inserted = tx
                .execute(
                    "INSERT INTO interaction_stream (id, entity_id, group_id, state, last_active_at, created_at, updated_at)
                     VALUES (?1, ?2, ?3, 'dormant', NULL, ?4, ?4)
                     ON CONFLICT(id) DO NOTHING",
                    params![stream.to_string(), entity_id, group_id, now],
                )
                .map_err(db_err)?;
            if inserted > 0 {
                info!(stream = %stream, "created interaction stream");
            }
            Ok(())
        })
    }

    fn save_snapshot(&self, snapshot: &FlowSnapshot) -> Result<Vec<i64>> {
        let key = snapshot.stream.to_string();
        self.exec(|tx| {
            let updated = tx
                .execute(
                    "UPDATE interaction_stream SET state = ?1, last_active_at = ?2, updated_at = ?3 WHERE id = ?4",
                    params![
                        snapshot.state.as_str(),
                        snapshot.last_active.to_rfc3339(),
                        now_rfc3339(),
                        key
                    ],
                )
                .map_err(db_err)?;
            if updated == 0 {
                return Err(MaiError::Persistence(format!(
                    "no stream record for {}",
                    snapshot.stream
                )));
            }

            let mut ids = Vec::with_capacity(snapshot.unsaved.len());
            for item in &snapshot.unsaved {
                tx.execute(
                    "INSERT INTO message (stream_id, sender_entity_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        key,
                        item.sender_entity_id,
                        item.content,
                        item.created_at.to_rfc3339()
                    ],
                )
                .map_err(db_err)?;
                ids.push(tx.last_insert_rowid());
            }

            debug!(
                stream = %snapshot.stream,
                state = %snapshot.state,
                appended = ids.len(),
                "saved flow snapshot"
            );
            Ok(ids)
        })
    }
}

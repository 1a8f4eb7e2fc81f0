//! People, interaction entities, groups and group membership.

use mai_core::Result;
use rusqlite::{OptionalExtension, params};
use tracing::debug;

use crate::store::{SqliteStore, db_err, now_rfc3339};

impl SqliteStore {
    /// Register a platform identity, creating its person on first sight.
    ///
    /// Returns the interaction entity id. Registering the same
    /// `(platform_id, platform_user_id)` again returns the existing id.
    pub fn register_entity(&self, platform_id: &str, platform_user_id: &str) -> Result<i64> {
        self.exec(|tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM interaction_entity WHERE platform_id = ?1 AND platform_user_id = ?2",
                    params![platform_id, platform_user_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            if let Some(id) = existing {
                return Ok(id);
            }

            tx.execute(
                "INSERT INTO person (created_at) VALUES (?1)",
                params![now_rfc3339()],
            )
            .map_err(db_err)?;
            let person_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO interaction_entity (platform_id, platform_user_id, person_id) VALUES (?1, ?2, ?3)",
                params![platform_id, platform_user_id, person_id],
            )
            .map_err(db_err)?;
            let entity_id = tx.last_insert_rowid();
            debug!(platform_id, platform_user_id, entity_id, person_id, "registered entity");
            Ok(entity_id)
        })
    }

    /// Register a platform group, returning its id. Idempotent.
    pub fn register_group(&self, platform_id: &str, platform_group_id: &str) -> Result<i64> {
        self.exec(|tx| {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM interaction_group WHERE platform_id = ?1 AND platform_group_id = ?2",
                    params![platform_id, platform_group_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            if let Some(id) = existing {
                return Ok(id);
            }

            tx.execute(
                "INSERT INTO interaction_group (platform_id, platform_group_id) VALUES (?1, ?2)",
                params![platform_id, platform_group_id],
            )
            .map_err(db_err)?;
            let group_id = tx.last_insert_rowid();
            debug!(platform_id, platform_group_id, group_id, "registered group");
            Ok(group_id)
        })
    }

    pub fn add_group_member(&self, group_id: i64, entity_id: i64) -> Result<()> {
        self.exec(|tx| {
            tx.execute(
                "INSERT OR IGNORE INTO group_member (entity_id, group_id) VALUES (?1, ?2)",
                params![entity_id, group_id],
            )
            .map_err(db_err)?;
            Ok(())
        })
    }

    /// Entity ids of every member of a group.
    pub fn group_members(&self, group_id: i64) -> Result<Vec<i64>> {
        self.exec(|tx| {
            let mut stmt = tx
                .prepare("SELECT entity_id FROM group_member WHERE group_id = ?1 ORDER BY entity_id")
                .map_err(db_err)?;
            let rows = stmt
                .query_map(params![group_id], |row| row.get(0))
                .map_err(db_err)?;
            rows.collect::<std::result::Result<Vec<i64>, _>>()
                .map_err(db_err)
        })
    }
}

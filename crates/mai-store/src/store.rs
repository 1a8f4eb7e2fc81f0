use mai_core::{MaiError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Transaction};
use semver::Version;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Schema version this build reads and writes.
pub const SUPPORTED_SCHEMA: &str = "0.1.0";

/// SQLite persistence gateway.
///
/// Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        info!(?path, "opening stream store");

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// Open an in-memory database (for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS database_version (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                version TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS person (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS interaction_entity (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                platform_id TEXT NOT NULL,
                platform_user_id TEXT NOT NULL,
                person_id INTEGER NOT NULL REFERENCES person(id),
                UNIQUE(platform_id, platform_user_id)
            );

            CREATE TABLE IF NOT EXISTS interaction_group (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                platform_id TEXT NOT NULL,
                platform_group_id TEXT NOT NULL,
                UNIQUE(platform_id, platform_group_id)
            );

            CREATE TABLE IF NOT EXISTS group_member (
                entity_id INTEGER NOT NULL REFERENCES interaction_entity(id),
                group_id INTEGER NOT NULL REFERENCES interaction_group(id),
                PRIMARY KEY (entity_id, group_id)
            );

            CREATE TABLE IF NOT EXISTS interaction_stream (
                id TEXT PRIMARY KEY,
                entity_id INTEGER REFERENCES interaction_entity(id),
                group_id INTEGER REFERENCES interaction_group(id),
                state TEXT,
                last_active_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS message (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                stream_id TEXT NOT NULL REFERENCES interaction_stream(id),
                sender_entity_id INTEGER NOT NULL REFERENCES interaction_entity(id),
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_entity_platform_user ON interaction_entity(platform_id, platform_user_id);
            CREATE INDEX IF NOT EXISTS idx_group_platform_group ON interaction_group(platform_id, platform_group_id);
            CREATE INDEX IF NOT EXISTS idx_stream_entity_group ON interaction_stream(entity_id, group_id);
            CREATE INDEX IF NOT EXISTS idx_message_stream ON message(stream_id, id);
            ",
        )
        .map_err(db_err)?;

        let store = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        store.check_schema_version()?;
        Ok(store)
    }

    /// Stamp a fresh database with [`SUPPORTED_SCHEMA`], or refuse one stamped
    /// with a different version.
    fn check_schema_version(&self) -> Result<()> {
        let found = self.exec(|tx| {
            let existing: Option<String> = tx
                .query_row("SELECT version FROM database_version WHERE id = 0", [], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(db_err)?;
            match existing {
                Some(version) => Ok(version),
                None => {
                    tx.execute(
                        "INSERT INTO database_version (id, version) VALUES (0, ?1)",
                        rusqlite::params![SUPPORTED_SCHEMA],
                    )
                    .map_err(db_err)?;
                    info!(version = SUPPORTED_SCHEMA, "stamped new database");
                    Ok(SUPPORTED_SCHEMA.to_string())
                }
            }
        })?;

        let required = Version::parse(SUPPORTED_SCHEMA)
            .map_err(|e| MaiError::Persistence(format!("bad built-in schema version: {e}")))?;
        let compatible = Version::parse(&found).is_ok_and(|v| v == required);
        if !compatible {
            return Err(MaiError::SchemaVersion {
                required: SUPPORTED_SCHEMA.to_string(),
                found,
            });
        }
        Ok(())
    }

    /// Run one unit of work inside a transaction.
    ///
    /// Commits when `unit` returns `Ok`, rolls back when it returns `Err`.
    pub fn exec<T, F>(&self, unit: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.db.lock();
        let tx = conn.transaction().map_err(db_err)?;
        match unit(&tx) {
            Ok(value) => {
                tx.commit().map_err(db_err)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "transaction rollback failed");
                }
                debug!(error = %e, "transaction rolled back");
                Err(e)
            }
        }
    }

    /// Get a reference to the raw database connection (for advanced queries).
    pub fn db(&self) -> parking_lot::MutexGuard<'_, Connection> {
        self.db.lock()
    }
}

pub(crate) fn db_err(e: rusqlite::Error) -> MaiError {
    MaiError::Persistence(e.to_string())
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

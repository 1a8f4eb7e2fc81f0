use thiserror::Error;

/// Unified error type for the entire Mai runtime.
#[derive(Error, Debug)]
pub enum MaiError {
    // ── Stream / flow errors ───────────────────────────────────
    #[error("invalid stream reference: {stream}: {reason}")]
    InvalidReference { stream: String, reason: String },

    #[error("failed to restore stream: {stream}: {reason}")]
    RestoreItem { stream: String, reason: String },

    #[error("observation tick failed: {stream}: {reason}")]
    Tick { stream: String, reason: String },

    #[error("flow shutdown failed: {stream}: {reason}")]
    Shutdown { stream: String, reason: String },

    // ── Persistence errors ─────────────────────────────────────
    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("database schema mismatch: requires {required}, found {found}")]
    SchemaVersion { required: String, found: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MaiError>;

//! # mai-store
//!
//! SQLite-backed persistence for the Mai runtime:
//!
//! - **Directory**: people, their platform identities (interaction entities),
//!   groups and group membership.
//! - **Streams**: one record per interaction stream, carrying the last flushed
//!   flow state.
//! - **Messages**: the conversation items of every stream.
//!
//! Every operation runs as one transaction through [`SqliteStore::exec`].

pub mod directory;
pub mod store;
pub mod streams;

pub use store::{SUPPORTED_SCHEMA, SqliteStore};

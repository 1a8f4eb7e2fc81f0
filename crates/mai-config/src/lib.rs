//! # mai-config
//!
//! Configuration system for the Mai runtime. Reads from `mai.toml` and
//! environment variables, in that precedence order.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::MaiConfig;
pub use schema::{ConfigWarning, DatabaseConfig, LoggingConfig, ThinkingConfig, WarningSeverity};

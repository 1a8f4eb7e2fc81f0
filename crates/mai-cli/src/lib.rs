//! # mai-cli
//!
//! Command-line interface for the Mai thinking-flow runtime.
//!
//! ## Commands
//!
//! - `mai start` — Restore thinking flows and run their observers until Ctrl-C
//! - `mai streams` — List persisted interaction streams and their flow state
//! - `mai config` — Show the effective configuration
//! - `mai version` — Show version and build info

pub mod commands;

pub use commands::Cli;

//! # mai-core
//!
//! Core types, traits, and primitives for the Mai thinking-flow runtime.
//! This crate defines the shared vocabulary used by every other crate in the workspace:
//! stream identifiers, conversation items, flow states, and the persistence
//! gateway trait the runtime talks to.

pub mod error;
pub mod item;
pub mod state;
pub mod store;
pub mod stream;

pub use error::{MaiError, Result};
pub use item::ConversationItem;
pub use state::FlowState;
pub use store::{FlowSnapshot, StreamRecord, StreamStore};
pub use stream::StreamId;

//! # mai-thinking
//!
//! One [`ThinkingFlow`] per interaction stream. A flow owns its
//! [`FlowState`](mai_core::FlowState), a bounded [`ObservationWindow`] of recent
//! conversation items, and a [`FlowScheduler`] that runs observation ticks at a
//! cadence picked by the state:
//!
//! - **dormant**: no ticks, no timers; the loop is parked until signalled.
//! - **engaged**: one tick per engaged interval.
//! - **focused**: one tick per focused interval.
//!
//! What a tick actually decides is delegated to a [`DecisionHook`].
//! The [`FlowRegistry`] maps stream ids to flows and owns restoration at
//! startup and coordinated shutdown.

pub mod executor;
pub mod flow;
pub mod hook;
pub mod registry;
pub mod scheduler;
pub mod window;

pub use executor::TaskExecutor;
pub use flow::{FlowSettings, ThinkingFlow};
pub use hook::{DecisionHook, IdleHook};
pub use registry::{FlowRegistry, FlowStateCounts, RestoreReport, ShutdownReport};
pub use scheduler::{FlowScheduler, ObserveIntervals};
pub use window::ObservationWindow;

//! The conversation orchestrator.
//!
//! Owns the message history and runs the turn loop between the user, the
//! model and the tool dispatcher. Observers follow along through the
//! [`EventBus`].

mod config;
mod core;
mod events;
mod handle;
mod state;

pub use self::core::{Orchestrator, TurnOutcome};
pub use config::OrchestratorConfig;
pub use events::{AgentEvent, EventBus, DEFAULT_EVENT_CAPACITY};
pub use handle::OrchestratorHandle;
pub use state::AgentState;

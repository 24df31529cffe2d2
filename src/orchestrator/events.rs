//! Orchestrator events.
//!
//! Observers (the terminal front end, tests) subscribe to an [`EventBus`] and
//! receive every event emitted after they subscribed. Slow subscribers lag
//! and skip events; they never block the loop.

use super::state::AgentState;
use crate::messages::Message;
use crate::types::TurnId;
use tokio::sync::broadcast;

/// Default number of buffered events per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something observable happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// A message was appended to the conversation
    MessageAppended {
        /// Position of the message in the conversation
        index: usize,
        /// The appended message
        message: Message,
    },
    /// A user turn finished with a final assistant reply
    TurnCompleted {
        /// The finished turn
        turn_id: TurnId,
        /// Text of the final assistant message
        reply: Option<String>,
        /// Number of tool rounds the turn needed
        tool_rounds: usize,
    },
    /// A tool handler was invoked
    ToolUsageChanged {
        /// Tool name
        tool: String,
        /// Total invocations of the tool so far
        count: u64,
    },
    /// The orchestrator moved to another state
    StateChanged {
        /// Previous state
        from: AgentState,
        /// New state
        to: AgentState,
    },
}

/// Fan-out channel for [`AgentEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribes to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.sender.subscribe()
    }

    /// Emits an event. Having no subscribers is not an error.
    pub fn emit(&self, event: AgentEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.emit(AgentEvent::ToolUsageChanged {
            tool: "echo".into(),
            count: 1,
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            AgentEvent::ToolUsageChanged {
                tool: "echo".into(),
                count: 1
            }
        );
    }

    #[test]
    fn emit_without_subscribers_is_fine() {
        let bus = EventBus::new(4);
        bus.emit(AgentEvent::StateChanged {
            from: AgentState::Idle,
            to: AgentState::AwaitingModel,
        });
    }
}

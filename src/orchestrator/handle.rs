//! Shareable front for an orchestrator.

use super::core::{Orchestrator, TurnOutcome};
use super::events::{AgentEvent, EventBus};
use crate::conversation::ConversationView;
use crate::error::AgentLoopError;
use crate::messages::Message;
use crate::tools::UsageCounters;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// A cloneable handle that serializes turns on one orchestrator.
///
/// Input that arrives while a turn is running is rejected with `Busy`
/// instead of waiting or interleaving with the running turn.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    inner: Arc<Mutex<Orchestrator>>,
    view: ConversationView,
    events: EventBus,
    usage: Arc<UsageCounters>,
}

impl OrchestratorHandle {
    /// Wraps an orchestrator.
    #[must_use]
    pub fn new(orchestrator: Orchestrator) -> Self {
        let view = orchestrator.view();
        let events = orchestrator.events().clone();
        let usage = Arc::clone(orchestrator.dispatcher().usage());
        Self {
            inner: Arc::new(Mutex::new(orchestrator)),
            view,
            events,
            usage,
        }
    }

    /// Runs one user turn unless another is in progress.
    ///
    /// # Errors
    ///
    /// Returns `Busy` if a turn is already running, otherwise whatever
    /// [`Orchestrator::submit_user_input`] returns.
    pub async fn submit_user_input(
        &self,
        text: impl Into<String>,
    ) -> Result<TurnOutcome, AgentLoopError> {
        let Ok(mut orchestrator) = self.inner.try_lock() else {
            tracing::warn!("rejecting input; a turn is already running");
            return Err(AgentLoopError::busy());
        };
        orchestrator.submit_user_input(text).await
    }

    /// Returns true while a turn holds the orchestrator.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Returns a read-only view of the history.
    #[must_use]
    pub fn view(&self) -> ConversationView {
        self.view.clone()
    }

    /// Returns a copy of the full history. Does not wait for a running turn.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.view.snapshot()
    }

    /// Subscribes to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Returns per-tool invocation counts in registration order.
    #[must_use]
    pub fn usage(&self) -> Vec<(String, u64)> {
        self.usage.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelResponse;
    use crate::orchestrator::OrchestratorConfig;
    use crate::testing::ScriptedModel;
    use crate::tools::ToolRegistry;
    use std::time::Duration;

    fn handle_with(model: ScriptedModel) -> OrchestratorHandle {
        let registry = Arc::new(ToolRegistry::builder().build().unwrap());
        OrchestratorHandle::new(Orchestrator::with_registry(
            Arc::new(model),
            registry,
            OrchestratorConfig::default(),
        ))
    }

    #[tokio::test]
    async fn concurrent_input_is_rejected_as_busy() {
        let handle = handle_with(
            ScriptedModel::replying([ModelResponse::text("slow answer")])
                .with_delay(Duration::from_millis(200)),
        );

        let running = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.submit_user_input("first").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(handle.is_busy());
        let rejected = handle.submit_user_input("second").await.unwrap_err();
        assert!(rejected.is_busy());

        let outcome = running.await.unwrap().unwrap();
        assert_eq!(outcome.reply.as_deref(), Some("slow answer"));
        let history = handle.snapshot();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text(), "first");
    }

    #[tokio::test]
    async fn snapshot_is_readable_during_a_turn() {
        let handle = handle_with(
            ScriptedModel::replying([ModelResponse::text("ok")])
                .with_delay(Duration::from_millis(100)),
        );

        let running = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.submit_user_input("hello").await })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(handle.snapshot().len(), 1);
        running.await.unwrap().unwrap();
        assert_eq!(handle.view().len(), 2);
    }
}

//! The conversation loop.
//!
//! An [`Orchestrator`] owns one conversation and drives it one user turn at a
//! time: call the model, append its answer, dispatch any requested tools as a
//! single batch, append every result, and repeat until the model answers
//! without tool calls.

use super::config::OrchestratorConfig;
use super::events::{AgentEvent, EventBus};
use super::state::AgentState;
use crate::conversation::{Conversation, ConversationView};
use crate::error::AgentLoopError;
use crate::llm::{ModelClient, ModelRequest};
use crate::messages::{Message, ToolCallRequest, ToolResult};
use crate::tools::{ToolDispatcher, ToolError, ToolRegistry};
use crate::types::{ConversationId, TurnId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, info_span, warn, Instrument};

/// What a completed user turn produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// The turn's identifier
    pub turn_id: TurnId,
    /// Text of the final assistant answer, if it had any
    pub reply: Option<String>,
    /// Number of tool rounds the turn needed
    pub tool_rounds: usize,
    /// Number of messages appended during the turn, the user message included
    pub messages_appended: usize,
}

/// Drives one conversation between the user, the model and the tools.
#[derive(Debug)]
pub struct Orchestrator {
    conversation: Conversation,
    model: Arc<dyn ModelClient>,
    dispatcher: ToolDispatcher,
    config: OrchestratorConfig,
    events: EventBus,
    state: AgentState,
}

impl Orchestrator {
    /// Creates an orchestrator over an existing dispatcher.
    ///
    /// Events go to the dispatcher's bus so subscribers see usage changes and
    /// conversation changes on one stream.
    #[must_use]
    pub fn new(
        model: Arc<dyn ModelClient>,
        dispatcher: ToolDispatcher,
        config: OrchestratorConfig,
    ) -> Self {
        let events = dispatcher.events().clone();
        Self {
            conversation: Conversation::new(),
            model,
            dispatcher,
            config,
            events,
            state: AgentState::Idle,
        }
    }

    /// Creates an orchestrator with a fresh event bus and dispatcher.
    #[must_use]
    pub fn with_registry(
        model: Arc<dyn ModelClient>,
        registry: Arc<ToolRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(registry, EventBus::default());
        Self::new(model, dispatcher, config)
    }

    /// Returns the conversation identifier.
    #[must_use]
    pub fn conversation_id(&self) -> &ConversationId {
        self.conversation.id()
    }

    /// Returns a read-only view of the history.
    #[must_use]
    pub fn view(&self) -> ConversationView {
        self.conversation.view()
    }

    /// Returns a copy of the full history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.conversation.snapshot()
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> AgentState {
        self.state
    }

    /// Subscribes to events emitted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Returns the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Returns the dispatcher tool calls are routed through.
    #[must_use]
    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Returns per-tool invocation counts in registration order.
    #[must_use]
    pub fn usage(&self) -> Vec<(String, u64)> {
        self.dispatcher.usage().snapshot()
    }

    /// Runs one user turn to completion.
    ///
    /// # Errors
    ///
    /// - `EmptyInput` if `text` is blank; history is untouched
    /// - `ModelUnavailable` / `ModelError` if a model call fails; everything
    ///   appended before the failure stays
    /// - `TurnLimitExceeded` if the configured tool round cap is reached
    pub async fn submit_user_input(
        &mut self,
        text: impl Into<String>,
    ) -> Result<TurnOutcome, AgentLoopError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(AgentLoopError::empty_input());
        }

        if self.state.is_active() {
            self.recover_abandoned_turn();
        }

        let turn_id = TurnId::new();
        let span = info_span!(
            "turn",
            conversation_id = %self.conversation.id(),
            turn_id = %turn_id,
        );
        self.run_turn(turn_id, text).instrument(span).await
    }

    async fn run_turn(
        &mut self,
        turn_id: TurnId,
        text: String,
    ) -> Result<TurnOutcome, AgentLoopError> {
        let start_len = self.conversation.len();
        info!(input_len = text.len(), "user turn started");

        self.append(Message::user(text));
        self.transition(AgentState::AwaitingModel);

        let mut tool_rounds = 0;
        loop {
            let request = ModelRequest {
                system_prompt: self.config.system_prompt.clone(),
                messages: self.conversation.snapshot(),
                tools: self.dispatcher.registry().list(),
            };

            let response = match self.model.call(request).await {
                Ok(response) => response,
                Err(error) => {
                    warn!(%error, provider = self.model.provider_name(), "model call failed");
                    self.finish_turn();
                    return Err(error.into());
                }
            };

            let reply = response.non_empty_text().map(str::to_string);
            let calls = response.tool_calls;

            if reply.is_some() || !calls.is_empty() {
                self.append(Message::assistant_with_tools(reply.clone(), calls.clone()));
            }

            if calls.is_empty() {
                self.finish_turn();
                let outcome = TurnOutcome {
                    turn_id: turn_id.clone(),
                    reply: reply.clone(),
                    tool_rounds,
                    messages_appended: self.conversation.len() - start_len,
                };
                info!(
                    tool_rounds,
                    messages_appended = outcome.messages_appended,
                    "user turn completed"
                );
                self.events.emit(AgentEvent::TurnCompleted {
                    turn_id,
                    reply,
                    tool_rounds,
                });
                return Ok(outcome);
            }

            self.transition(AgentState::DispatchingTools);
            debug!(tool_calls = calls.len(), "dispatching tool calls");

            let results = self.dispatcher.dispatch(&calls).await;
            for result in pair_results(&calls, results) {
                self.append(result.into_message());
            }
            tool_rounds += 1;

            if let Some(limit) = self.config.max_tool_rounds {
                if tool_rounds >= limit {
                    warn!(limit, "tool round limit reached; ending turn");
                    self.finish_turn();
                    return Err(AgentLoopError::turn_limit_exceeded(limit));
                }
            }

            self.transition(AgentState::AwaitingModel);
        }
    }

    /// Answers calls left open by a turn whose future was dropped.
    fn recover_abandoned_turn(&mut self) {
        let pending = self.conversation.unanswered_tool_calls();
        warn!(
            state = %self.state,
            unanswered = pending.len(),
            "previous turn was abandoned; closing it"
        );
        for call in pending {
            let error = ToolError::runtime(
                &call.name,
                "cancelled: the turn was abandoned before this call finished",
            );
            self.append(ToolResult::failure(call.id, call.name, error).into_message());
        }
        self.finish_turn();
    }

    fn append(&self, message: Message) -> usize {
        let index = self.conversation.append(message.clone());
        self.events
            .emit(AgentEvent::MessageAppended { index, message });
        index
    }

    fn finish_turn(&mut self) {
        self.transition(AgentState::Terminated);
        self.transition(AgentState::Idle);
    }

    fn transition(&mut self, to: AgentState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        debug!(%from, %to, "state changed");
        self.events.emit(AgentEvent::StateChanged { from, to });
    }
}

/// Orders results to match the calls that produced them.
///
/// Every call gets exactly one result; a call the dispatcher did not answer
/// gets a runtime error.
fn pair_results(calls: &[ToolCallRequest], results: Vec<ToolResult>) -> Vec<ToolResult> {
    let mut by_id: HashMap<String, VecDeque<ToolResult>> = HashMap::new();
    for result in results {
        by_id
            .entry(result.call_id.clone())
            .or_default()
            .push_back(result);
    }

    calls
        .iter()
        .map(|call| {
            by_id
                .get_mut(&call.id)
                .and_then(VecDeque::pop_front)
                .unwrap_or_else(|| {
                    ToolResult::failure(
                        &call.id,
                        &call.name,
                        ToolError::runtime(&call.name, "no result was produced for this call"),
                    )
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LLMError, ModelResponse};
    use crate::messages::MessageRole;
    use crate::testing::{CountingTool, ScriptedModel};
    use crate::tools::{ArgumentSchema, Capability, FieldType, ToolDefinition};
    use serde_json::json;
    use std::time::Duration;

    fn registry_with(tools: Vec<(&str, Arc<CountingTool>)>) -> Arc<ToolRegistry> {
        let mut builder = ToolRegistry::builder();
        for (name, tool) in tools {
            builder = builder.register(
                ToolDefinition::new(
                    name,
                    "Echo the text back",
                    ArgumentSchema::new().required("text", FieldType::String, "Text"),
                    Capability::Pure,
                ),
                tool,
            );
        }
        Arc::new(builder.build().unwrap())
    }

    fn call(id: &str, tool: &str, text: &str) -> ToolCallRequest {
        ToolCallRequest::new(id, tool, json!({ "text": text }))
    }

    #[tokio::test]
    async fn blank_input_is_rejected_without_touching_history() {
        let model = Arc::new(ScriptedModel::default());
        let mut orchestrator = Orchestrator::with_registry(
            model.clone(),
            registry_with(vec![]),
            OrchestratorConfig::default(),
        );

        let error = orchestrator.submit_user_input("   ").await.unwrap_err();

        assert!(error.is_empty_input());
        assert!(orchestrator.view().is_empty());
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn model_sees_system_prompt_history_and_tools() {
        let model = Arc::new(ScriptedModel::replying([ModelResponse::text("hi")]));
        let mut orchestrator = Orchestrator::with_registry(
            model.clone(),
            registry_with(vec![("echo", Arc::new(CountingTool::echo()))]),
            OrchestratorConfig::new().with_system_prompt("Be brief."),
        );

        orchestrator.submit_user_input("hello").await.unwrap();

        let request = &model.requests()[0];
        assert_eq!(request.system_prompt.as_deref(), Some("Be brief."));
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].text(), "hello");
        assert_eq!(request.tools[0].name, "echo");
    }

    #[tokio::test]
    async fn tool_only_answer_is_appended_without_text() {
        let model = Arc::new(ScriptedModel::replying([
            ModelResponse::tool_calls(None, vec![call("c1", "echo", "x")]),
            ModelResponse::text("done"),
        ]));
        let mut orchestrator = Orchestrator::with_registry(
            model,
            registry_with(vec![("echo", Arc::new(CountingTool::echo()))]),
            OrchestratorConfig::default(),
        );

        let outcome = orchestrator.submit_user_input("go").await.unwrap();
        let history = orchestrator.snapshot();

        assert_eq!(outcome.tool_rounds, 1);
        assert_eq!(outcome.messages_appended, 4);
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert!(history[1].content.is_none());
        assert_eq!(history[1].tool_calls.len(), 1);
        assert_eq!(history[2].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(history[3].text(), "done");
    }

    #[tokio::test]
    async fn tool_messages_follow_call_order_not_completion_order() {
        let slow = Arc::new(CountingTool::echo().with_delay(Duration::from_millis(100)));
        let fast = Arc::new(CountingTool::echo());
        let model = Arc::new(ScriptedModel::replying([
            ModelResponse::tool_calls(
                Some("Working on it".to_string()),
                vec![call("slow-1", "slow", "a"), call("fast-1", "fast", "b")],
            ),
            ModelResponse::text("done"),
        ]));
        let mut orchestrator = Orchestrator::with_registry(
            model,
            registry_with(vec![("slow", slow), ("fast", fast)]),
            OrchestratorConfig::default(),
        );

        orchestrator.submit_user_input("go").await.unwrap();
        let ids: Vec<_> = orchestrator
            .snapshot()
            .iter()
            .filter_map(|m| m.tool_call_id.clone())
            .collect();

        assert_eq!(ids, vec!["slow-1", "fast-1"]);
    }

    #[tokio::test]
    async fn model_failure_keeps_history_and_returns_to_idle() {
        let model = Arc::new(ScriptedModel::new([Err(LLMError::network("connection refused"))]));
        let mut orchestrator = Orchestrator::with_registry(
            model,
            registry_with(vec![]),
            OrchestratorConfig::default(),
        );

        let error = orchestrator.submit_user_input("hello").await.unwrap_err();

        assert!(error.is_model_unavailable());
        assert_eq!(orchestrator.snapshot().len(), 1);
        assert_eq!(orchestrator.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn model_error_after_tool_round_keeps_tool_messages() {
        let model = Arc::new(ScriptedModel::new([
            Ok(ModelResponse::tool_calls(None, vec![call("c1", "echo", "x")])),
            Err(LLMError::invalid_request("context too long")),
        ]));
        let mut orchestrator = Orchestrator::with_registry(
            model,
            registry_with(vec![("echo", Arc::new(CountingTool::echo()))]),
            OrchestratorConfig::default(),
        );

        let error = orchestrator.submit_user_input("go").await.unwrap_err();

        assert!(error.is_model_error());
        let history = orchestrator.snapshot();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].role, MessageRole::Tool);
    }

    #[tokio::test]
    async fn round_cap_ends_turn_with_well_formed_history() {
        let model = Arc::new(ScriptedModel::replying([
            ModelResponse::tool_calls(None, vec![call("c1", "echo", "x")]),
            ModelResponse::tool_calls(None, vec![call("c2", "echo", "y")]),
            ModelResponse::text("never reached"),
        ]));
        let mut orchestrator = Orchestrator::with_registry(
            model.clone(),
            registry_with(vec![("echo", Arc::new(CountingTool::echo()))]),
            OrchestratorConfig::new().with_max_tool_rounds(2),
        );

        let error = orchestrator.submit_user_input("loop").await.unwrap_err();

        assert!(error.is_turn_limit_exceeded());
        assert_eq!(model.call_count(), 2);
        let history = orchestrator.snapshot();
        assert_eq!(history.len(), 5);
        assert_eq!(history[4].tool_call_id.as_deref(), Some("c2"));
        assert_eq!(orchestrator.state(), AgentState::Idle);
    }

    #[tokio::test]
    async fn abandoned_turn_is_closed_before_the_next_one() {
        let stuck = Arc::new(CountingTool::echo().with_delay(Duration::from_secs(60)));
        let model = Arc::new(ScriptedModel::replying([
            ModelResponse::tool_calls(None, vec![call("c1", "stuck", "x")]),
            ModelResponse::text("fresh start"),
        ]));
        let mut orchestrator = Orchestrator::with_registry(
            model,
            registry_with(vec![("stuck", stuck)]),
            OrchestratorConfig::default(),
        );

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            orchestrator.submit_user_input("first"),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(orchestrator.state(), AgentState::DispatchingTools);

        let outcome = orchestrator.submit_user_input("second").await.unwrap();
        let history = orchestrator.snapshot();

        assert_eq!(outcome.reply.as_deref(), Some("fresh start"));
        assert_eq!(history[2].tool_call_id.as_deref(), Some("c1"));
        assert!(history[2].text().contains("cancelled"));
        assert_eq!(history[3].text(), "second");
    }

    #[tokio::test]
    async fn state_changes_are_emitted_in_order() {
        let model = Arc::new(ScriptedModel::replying([ModelResponse::text("hi")]));
        let mut orchestrator = Orchestrator::with_registry(
            model,
            registry_with(vec![]),
            OrchestratorConfig::default(),
        );
        let mut rx = orchestrator.subscribe();

        orchestrator.submit_user_input("hello").await.unwrap();

        let mut states = Vec::new();
        let mut completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                AgentEvent::StateChanged { to, .. } => states.push(to),
                AgentEvent::TurnCompleted { reply, .. } => {
                    completed = true;
                    assert_eq!(reply.as_deref(), Some("hi"));
                }
                _ => {}
            }
        }
        assert_eq!(
            states,
            vec![
                AgentState::AwaitingModel,
                AgentState::Terminated,
                AgentState::Idle
            ]
        );
        assert!(completed);
    }

    #[test]
    fn missing_results_become_runtime_errors() {
        let calls = vec![call("a", "echo", "1"), call("b", "echo", "2")];
        let results = vec![ToolResult::success("b", "echo", json!(2))];

        let paired = pair_results(&calls, results);

        assert_eq!(paired[0].call_id, "a");
        assert!(paired[0].error().unwrap().is_runtime_error());
        assert_eq!(paired[1].call_id, "b");
        assert!(paired[1].is_success());
    }

    #[test]
    fn duplicate_call_ids_each_get_one_result() {
        let calls = vec![call("dup", "echo", "1"), call("dup", "echo", "2")];
        let results = vec![
            ToolResult::success("dup", "echo", json!(1)),
            ToolResult::success("dup", "echo", json!(2)),
        ];

        let paired = pair_results(&calls, results);

        assert_eq!(paired[0].outcome, Ok(json!(1)));
        assert_eq!(paired[1].outcome, Ok(json!(2)));
    }
}

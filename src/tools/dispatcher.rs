//! Concurrent tool dispatch.
//!
//! The dispatcher turns one assistant message's tool calls into exactly one
//! [`ToolResult`] per call. Calls run concurrently; a failing or panicking
//! tool only fails its own result.

use crate::messages::{ToolCallRequest, ToolResult};
use crate::orchestrator::{AgentEvent, EventBus};
use crate::tools::error::ToolError;
use crate::tools::registry::ToolRegistry;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

/// Per-tool invocation counters.
///
/// Counters exist for every registered tool from the start and only ever
/// increase.
#[derive(Debug)]
pub struct UsageCounters {
    order: Vec<String>,
    counts: HashMap<String, AtomicU64>,
}

impl UsageCounters {
    /// Creates zeroed counters for every tool in the registry.
    #[must_use]
    pub fn for_registry(registry: &ToolRegistry) -> Self {
        let order: Vec<String> = registry.names().into_iter().map(String::from).collect();
        let counts = order
            .iter()
            .map(|name| (name.clone(), AtomicU64::new(0)))
            .collect();
        Self { order, counts }
    }

    /// Increments a tool's counter and returns the new value.
    pub fn increment(&self, tool: &str) -> u64 {
        self.counts
            .get(tool)
            .map_or(0, |c| c.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Returns a tool's current count.
    #[must_use]
    pub fn get(&self, tool: &str) -> u64 {
        self.counts
            .get(tool)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Returns every counter in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        self.order
            .iter()
            .map(|name| (name.clone(), self.get(name)))
            .collect()
    }
}

/// Validates and routes tool calls to their handlers.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    usage: Arc<UsageCounters>,
    events: EventBus,
}

impl ToolDispatcher {
    /// Creates a dispatcher over `registry`, reporting usage on `events`.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, events: EventBus) -> Self {
        let usage = Arc::new(UsageCounters::for_registry(&registry));
        Self {
            registry,
            usage,
            events,
        }
    }

    /// Returns the registry calls are routed through.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Returns the usage counters.
    #[must_use]
    pub fn usage(&self) -> &Arc<UsageCounters> {
        &self.usage
    }

    /// Returns the bus usage changes are reported on.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Runs a batch of calls concurrently.
    ///
    /// Returns one result per request, in request order, each echoing its
    /// request's call id.
    pub async fn dispatch(&self, requests: &[ToolCallRequest]) -> Vec<ToolResult> {
        let calls = requests.iter().cloned().map(|request| {
            let span = info_span!("tool_call", tool = %request.name, call_id = %request.id);
            self.dispatch_one(request).instrument(span)
        });
        join_all(calls).await
    }

    async fn dispatch_one(&self, request: ToolCallRequest) -> ToolResult {
        let ToolCallRequest {
            id,
            name,
            arguments,
        } = request;

        let tool = match self.registry.lookup(&name) {
            Ok(tool) => tool,
            Err(error) => {
                warn!("model requested an unknown tool");
                return ToolResult::failure(id, name, error);
            }
        };

        if let Err(reason) = tool.definition.schema.validate(&arguments) {
            warn!(%reason, "tool arguments failed validation");
            return ToolResult::failure(id, &name, ToolError::invalid_arguments(&name, reason));
        }

        let count = self.usage.increment(&name);
        self.events.emit(AgentEvent::ToolUsageChanged {
            tool: name.clone(),
            count,
        });

        let handler = Arc::clone(&tool.handler);
        let started = Instant::now();
        let outcome = AssertUnwindSafe(async move { handler.call(arguments).await })
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Err(ToolError::runtime(
                    &name,
                    format!("handler panicked: {}", panic_message(panic.as_ref())),
                ))
            });

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(_) => debug!(elapsed_ms, "tool call succeeded"),
            Err(error) => warn!(elapsed_ms, kind = error.kind_name(), %error, "tool call failed"),
        }

        ToolResult {
            call_id: id,
            tool_name: name,
            outcome,
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingTool;
    use crate::tools::definition::{Capability, ToolDefinition};
    use crate::tools::schema::{ArgumentSchema, FieldType};
    use serde_json::json;
    use std::time::Duration;

    fn echo_definition(name: &str) -> ToolDefinition {
        ToolDefinition::new(
            name,
            "Echo the text back",
            ArgumentSchema::new().required("text", FieldType::String, "Text to echo"),
            Capability::Pure,
        )
    }

    fn dispatcher_with(tools: Vec<(&str, Arc<CountingTool>)>) -> ToolDispatcher {
        let mut builder = ToolRegistry::builder();
        for (name, tool) in tools {
            builder = builder.register(echo_definition(name), tool);
        }
        ToolDispatcher::new(Arc::new(builder.build().unwrap()), EventBus::default())
    }

    #[tokio::test]
    async fn one_result_per_request_in_order() {
        let echo = Arc::new(CountingTool::echo());
        let dispatcher = dispatcher_with(vec![("echo", Arc::clone(&echo))]);

        let results = dispatcher
            .dispatch(&[
                ToolCallRequest::new("a", "echo", json!({"text": "1"})),
                ToolCallRequest::new("b", "echo", json!({"text": "2"})),
                ToolCallRequest::new("c", "echo", json!({"text": "3"})),
            ])
            .await;

        let ids: Vec<&str> = results.iter().map(|r| r.call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(results.iter().all(ToolResult::is_success));
        assert_eq!(echo.calls(), 3);
    }

    #[tokio::test]
    async fn unknown_tool_never_invokes_a_handler() {
        let echo = Arc::new(CountingTool::echo());
        let dispatcher = dispatcher_with(vec![("echo", Arc::clone(&echo))]);

        let results = dispatcher
            .dispatch(&[ToolCallRequest::new("x", "weather", json!({}))])
            .await;

        assert!(results[0].error().unwrap().is_unknown_tool());
        assert_eq!(echo.calls(), 0);
    }

    #[tokio::test]
    async fn invalid_arguments_never_invoke_a_handler() {
        let echo = Arc::new(CountingTool::echo());
        let dispatcher = dispatcher_with(vec![("echo", Arc::clone(&echo))]);

        let results = dispatcher
            .dispatch(&[ToolCallRequest::new("x", "echo", json!({"text": 5}))])
            .await;

        assert!(results[0].error().unwrap().is_invalid_arguments());
        assert_eq!(echo.calls(), 0);
        assert_eq!(dispatcher.usage().get("echo"), 0);
    }

    #[tokio::test]
    async fn handler_error_becomes_failed_result() {
        let failing = Arc::new(CountingTool::failing("upstream down"));
        let dispatcher = dispatcher_with(vec![("flaky", failing)]);

        let results = dispatcher
            .dispatch(&[ToolCallRequest::new("x", "flaky", json!({"text": "t"}))])
            .await;

        let error = results[0].error().unwrap();
        assert!(error.is_runtime_error());
        assert!(error.to_string().contains("upstream down"));
    }

    #[tokio::test]
    async fn panicking_handler_is_contained() {
        let panicking = Arc::new(CountingTool::panicking());
        let echo = Arc::new(CountingTool::echo());
        let dispatcher = dispatcher_with(vec![
            ("boom", panicking),
            ("echo", Arc::clone(&echo)),
        ]);

        let results = dispatcher
            .dispatch(&[
                ToolCallRequest::new("p", "boom", json!({"text": "t"})),
                ToolCallRequest::new("e", "echo", json!({"text": "ok"})),
            ])
            .await;

        assert!(results[0].error().unwrap().is_runtime_error());
        assert!(results[1].is_success());
    }

    #[tokio::test]
    async fn calls_run_concurrently() {
        let slow = Arc::new(CountingTool::echo().with_delay(Duration::from_millis(200)));
        let dispatcher = dispatcher_with(vec![("slow", slow)]);

        let started = Instant::now();
        let results = dispatcher
            .dispatch(&[
                ToolCallRequest::new("a", "slow", json!({"text": "1"})),
                ToolCallRequest::new("b", "slow", json!({"text": "2"})),
                ToolCallRequest::new("c", "slow", json!({"text": "3"})),
            ])
            .await;

        assert_eq!(results.len(), 3);
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn usage_changes_are_emitted() {
        let echo = Arc::new(CountingTool::echo());
        let registry = ToolRegistry::builder()
            .register(echo_definition("echo"), echo)
            .build()
            .unwrap();
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let dispatcher = ToolDispatcher::new(Arc::new(registry), events);

        dispatcher
            .dispatch(&[ToolCallRequest::new("a", "echo", json!({"text": "1"}))])
            .await;

        assert_eq!(
            rx.recv().await.unwrap(),
            AgentEvent::ToolUsageChanged {
                tool: "echo".into(),
                count: 1
            }
        );
        assert_eq!(dispatcher.usage().snapshot(), vec![("echo".to_string(), 1)]);
    }

    #[test]
    fn unknown_counter_stays_zero() {
        let registry = ToolRegistry::builder().build().unwrap();
        let usage = UsageCounters::for_registry(&registry);
        assert_eq!(usage.increment("nope"), 0);
        assert_eq!(usage.get("nope"), 0);
    }
}

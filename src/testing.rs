//! Test doubles for driving the loop without a network.
//!
//! [`ScriptedModel`] replays queued model answers and records every request
//! it saw. [`CountingTool`] is a tool handler that counts its invocations and
//! can echo, fail, panic or stall on demand.
//!
//! Compiled only for this crate's own tests or with the `testing` feature.

use crate::llm::{LLMError, ModelClient, ModelRequest, ModelResponse};
use crate::tools::{ToolError, ToolFuture, ToolHandler};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// A model that answers from a fixed script.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ModelResponse, LLMError>>>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    /// Creates a model that answers with `responses` in order.
    #[must_use]
    pub fn new(responses: impl IntoIterator<Item = Result<ModelResponse, LLMError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    /// Creates a model whose every answer succeeds.
    #[must_use]
    pub fn replying(responses: impl IntoIterator<Item = ModelResponse>) -> Self {
        Self::new(responses.into_iter().map(Ok))
    }

    /// Makes every call wait before answering.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queues another answer.
    pub fn push(&self, response: Result<ModelResponse, LLMError>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of calls received so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn call(&self, request: ModelRequest) -> Result<ModelResponse, LLMError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Err(LLMError::invalid_request("scripted model has no answers left")))
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Echo,
    Fail(String),
    Panic,
}

/// A tool handler that counts its invocations.
#[derive(Debug, Clone)]
pub struct CountingTool {
    behavior: Behavior,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
}

impl CountingTool {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns its arguments unchanged.
    #[must_use]
    pub fn echo() -> Self {
        Self::with_behavior(Behavior::Echo)
    }

    /// Fails every call with a runtime error carrying `message`.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behavior(Behavior::Fail(message.into()))
    }

    /// Panics on every call.
    #[must_use]
    pub fn panicking() -> Self {
        Self::with_behavior(Behavior::Panic)
    }

    /// Sleeps for `delay` before doing anything else.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many times the handler was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ToolHandler for CountingTool {
    fn call(&self, args: Value) -> ToolFuture {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self.behavior.clone();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            match behavior {
                Behavior::Echo => Ok(args),
                Behavior::Fail(message) => Err(ToolError::runtime("counting_tool", message)),
                Behavior::Panic => panic!("counting tool was told to panic"),
            }
        })
    }
}

//! Append-only conversation history.
//!
//! A [`Conversation`] is owned by exactly one orchestrator, which is the only
//! writer. Everyone else reads through a [`ConversationView`], which hands out
//! snapshots and can never modify or reorder what was appended.

use crate::messages::{Message, MessageRole};
use crate::types::ConversationId;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// The ordered message sequence of one conversation.
pub struct Conversation {
    id: ConversationId,
    messages: Arc<RwLock<Vec<Message>>>,
}

impl Conversation {
    /// Creates an empty conversation with a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: ConversationId::new(),
            messages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Returns the conversation identifier.
    #[must_use]
    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Appends a message and returns its index.
    pub(crate) fn append(&self, message: Message) -> usize {
        let mut messages = self
            .messages
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        messages.push(message);
        messages.len() - 1
    }

    /// Returns a read-only handle that can outlive borrows of the conversation.
    #[must_use]
    pub fn view(&self) -> ConversationView {
        ConversationView {
            id: self.id.clone(),
            messages: Arc::clone(&self.messages),
        }
    }

    /// Returns a copy of the full history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.view().snapshot()
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.view().len()
    }

    /// Returns true if nothing has been appended yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the tool calls of the last assistant message that no tool
    /// message has answered yet.
    ///
    /// Non-empty only when a turn was abandoned between appending an
    /// assistant message and appending its tool results.
    #[must_use]
    pub(crate) fn unanswered_tool_calls(&self) -> Vec<crate::messages::ToolCallRequest> {
        let messages = self
            .messages
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(position) = messages
            .iter()
            .rposition(|m| m.role == MessageRole::Assistant)
        else {
            return Vec::new();
        };

        let answered: Vec<&str> = messages[position + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();

        let mut pending = Vec::new();
        let mut consumed = vec![false; answered.len()];
        for call in &messages[position].tool_calls {
            let matched = answered
                .iter()
                .enumerate()
                .find(|(i, id)| !consumed[*i] && **id == call.id);
            match matched {
                Some((i, _)) => consumed[i] = true,
                None => pending.push(call.clone()),
            }
        }
        pending
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}

/// Read-only access to a conversation's history.
#[derive(Clone)]
pub struct ConversationView {
    id: ConversationId,
    messages: Arc<RwLock<Vec<Message>>>,
}

impl ConversationView {
    /// Returns the conversation identifier.
    #[must_use]
    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    /// Returns a copy of the full history.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Message> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the message at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Message> {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(index)
            .cloned()
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if the conversation is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ConversationView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationView")
            .field("id", &self.id)
            .field("len", &self.len())
            .finish()
    }
}

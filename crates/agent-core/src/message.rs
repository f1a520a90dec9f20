//! Conversation Messages
//!
//! Role-tagged messages and the append-only conversation state mutated by
//! the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Tool => write!(f, "tool"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Text content (empty when the assistant only requested tools)
    #[serde(default)]
    pub content: String,

    /// Tool name, for tool messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Originating tool call, for tool messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool invocations requested by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// The assistant's raw turn: optional text plus any requested tool calls
    pub fn assistant_turn(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut msg = Self::new(Role::Assistant, content.unwrap_or_default());
        msg.tool_calls = tool_calls;
        msg
    }

    /// Tool message carrying one tool result
    pub fn tool_result(result: &ToolResult) -> Self {
        let mut msg = Self::new(Role::Tool, result.content.clone());
        msg.name = Some(result.tool_name.clone());
        msg.tool_call_id = Some(result.call_id.clone());
        msg
    }

    /// Add a name to the message
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Conversation state: ordered message history plus the loop's iteration
/// counter.
///
/// History only grows while a run is in progress. The one exception is
/// [`Conversation::ensure_system_prompt`], applied at run start.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    messages: Vec<Message>,

    #[serde(skip)]
    iterations: usize,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_prompt(prompt: impl Into<String>) -> Self {
        let mut conv = Self::new();
        conv.push(Message::system(prompt));
        conv
    }

    /// Hydrate from previously persisted history
    pub const fn from_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            iterations: 0,
        }
    }

    /// Add a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// Insert a system prompt at the front unless one is already present
    pub fn ensure_system_prompt(&mut self, prompt: &str) {
        if self.messages.first().map(|m| m.role) != Some(Role::System) {
            self.messages.insert(0, Message::system(prompt));
        }
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Start a new loop iteration, returning its 1-based number
    pub fn begin_iteration(&mut self) -> usize {
        self.iterations += 1;
        self.iterations
    }

    /// Iterations started during the current run
    pub const fn iterations(&self) -> usize {
        self.iterations
    }

    /// Reset the iteration counter at the start of a run
    pub fn reset_iterations(&mut self) {
        self.iterations = 0;
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_conversation() {
        let mut conv = Conversation::with_system_prompt("You are helpful.");
        conv.push(Message::user("Hi"));
        conv.push(Message::assistant("Hello!"));

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.last().unwrap().role, Role::Assistant);
    }

    #[test]
    fn tool_result_message_links_back_to_call() {
        let call = ToolCall::new("call-1", "multiply", r#"{"a":6,"b":7}"#);
        let msg = Message::tool_result(&ToolResult::success(&call, "42"));

        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(msg.name.as_deref(), Some("multiply"));
        assert_eq!(msg.content, "42");
    }

    #[test]
    fn system_prompt_is_inserted_once() {
        let mut conv = Conversation::from_messages(vec![Message::user("Hi")]);
        conv.ensure_system_prompt("Be brief.");
        conv.ensure_system_prompt("Be verbose.");

        assert_eq!(conv.len(), 2);
        assert_eq!(conv.messages()[0].content, "Be brief.");
    }

    #[test]
    fn assistant_turn_without_text_serializes_tool_calls() {
        let call = ToolCall::new("c1", "multiply", "{}");
        let msg = Message::assistant_turn(None, vec![call]);
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "");
        assert_eq!(json["tool_calls"][0]["name"], "multiply");
        assert!(json.get("tool_call_id").is_none());
    }

    #[test]
    fn iteration_counter() {
        let mut conv = Conversation::new();
        assert_eq!(conv.begin_iteration(), 1);
        assert_eq!(conv.begin_iteration(), 2);
        conv.reset_iterations();
        assert_eq!(conv.iterations(), 0);
    }
}

//! LLM Provider Strategy Pattern
//!
//! Defines the one capability the agent loop needs from a model backend:
//! given messages and optional tool specs, return text and/or requested tool
//! invocations. Wire formats stay inside each provider.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{GenerationOptions, LlmProvider};
//!
//! let provider = OllamaProvider::from_env();
//! let completion = provider.generate(&messages, &tools, &GenerationOptions::default()).await?;
//! ```

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Message;
use crate::tool::{ToolCall, ToolSchema};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "llama3.2", "qwen2.5")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

const fn default_temperature() -> f32 {
    0.7
}
const fn default_max_tokens() -> u32 {
    2048
}
const fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "llama3.2".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            stop_sequences: Vec::new(),
        }
    }
}

/// Response from an LLM call
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Completion {
    /// Final or interim text, if any
    pub content: Option<String>,

    /// Requested tool invocations, in the order the model issued them
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason
    pub finish_reason: Option<FinishReason>,
}

impl Completion {
    /// A text-only response
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    /// A response requesting tool calls
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            finish_reason: Some(FinishReason::ToolUse),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub context_length: Option<u32>,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name for logs and health output
    fn name(&self) -> &str;

    /// Generate the next assistant turn from the conversation so far
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion>;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(Vec::new())
    }
}

#[derive(Deserialize)]
struct TextToolCall {
    tool: String,
    #[serde(default)]
    arguments: serde_json::Value,
    #[serde(default)]
    id: Option<String>,
}

impl From<TextToolCall> for ToolCall {
    fn from(raw: TextToolCall) -> Self {
        let arguments = if raw.arguments.is_null() {
            "{}".to_string()
        } else {
            raw.arguments.to_string()
        };
        match raw.id {
            Some(id) => Self::new(id, raw.tool, arguments),
            None => Self::generated(raw.tool, arguments),
        }
    }
}

/// Extract tool calls from a text response for models without native tool
/// calling.
///
/// Every fenced block of the form
///
/// ````text
/// ```tool
/// {"tool": "multiply", "arguments": {"a": 6, "b": 7}}
/// ```
/// ````
///
/// yields one call, in order. Without fenced blocks, a single inline JSON
/// object with a `"tool"` key is accepted.
pub fn parse_text_tool_calls(content: &str) -> Vec<ToolCall> {
    const TOOL_START: &str = "```tool";
    const TOOL_END: &str = "```";

    let mut calls = Vec::new();
    let mut rest = content;

    while let Some(start_idx) = rest.find(TOOL_START) {
        let after_marker = &rest[start_idx + TOOL_START.len()..];
        let Some(end_idx) = after_marker.find(TOOL_END) else {
            break;
        };

        let json_str = after_marker[..end_idx].trim();
        match serde_json::from_str::<TextToolCall>(json_str) {
            Ok(raw) => calls.push(raw.into()),
            Err(e) => tracing::debug!(error = %e, "Skipping unparseable tool block"),
        }
        rest = &after_marker[end_idx + TOOL_END.len()..];
    }

    if calls.is_empty() {
        calls.extend(parse_inline_tool_call(content));
    }
    ensure_unique_call_ids(calls)
}

/// Replace blank or repeated call ids so every result in a batch maps back to
/// exactly one call.
pub fn ensure_unique_call_ids(calls: Vec<ToolCall>) -> Vec<ToolCall> {
    let mut seen = HashSet::with_capacity(calls.len());

    calls
        .into_iter()
        .map(|call| {
            if !call.id.is_empty() && seen.insert(call.id.clone()) {
                return call;
            }
            tracing::debug!(tool = %call.name, call_id = %call.id, "Reassigning duplicate tool call id");
            let fresh = ToolCall::generated(call.name, call.arguments);
            seen.insert(fresh.id.clone());
            fresh
        })
        .collect()
}

fn parse_inline_tool_call(content: &str) -> Option<ToolCall> {
    if !content.contains(r#""tool""#) {
        return None;
    }

    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end <= start {
        return None;
    }

    serde_json::from_str::<TextToolCall>(&content[start..=end])
        .ok()
        .map(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 2048);
        assert_eq!(opts.model, "llama3.2");
    }

    #[test]
    fn test_parse_fenced_tool_calls() {
        let content = r#"Let me compute both.
```tool
{"tool": "multiply", "arguments": {"a": 6, "b": 7}}
```
```tool
{"tool": "generate_random_number", "arguments": {"min_val": 1, "max_val": 6}, "id": "dice"}
```"#;

        let calls = parse_text_tool_calls(content);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "multiply");
        let args: serde_json::Value = serde_json::from_str(&calls[0].arguments).unwrap();
        assert_eq!(args["a"], 6);
        assert!(!calls[0].id.is_empty());
        assert_eq!(calls[1].id, "dice");
    }

    #[test]
    fn repeated_ids_are_reassigned() {
        let content = r#"```tool
{"tool": "multiply", "arguments": {"a": 1, "b": 2}, "id": "x"}
```
```tool
{"tool": "multiply", "arguments": {"a": 3, "b": 4}, "id": "x"}
```"#;

        let calls = parse_text_tool_calls(content);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].id, "x");
        assert_ne!(calls[1].id, "x");
        assert!(!calls[1].id.is_empty());
        assert_eq!(calls[1].arguments, r#"{"a":3,"b":4}"#);
    }

    #[test]
    fn blank_ids_are_replaced() {
        let calls = ensure_unique_call_ids(vec![
            ToolCall::new("", "datetime", "{}"),
            ToolCall::new("", "datetime", "{}"),
        ]);
        assert!(calls.iter().all(|c| !c.id.is_empty()));
        assert_ne!(calls[0].id, calls[1].id);
    }

    #[test]
    fn test_parse_inline_tool_call() {
        let calls = parse_text_tool_calls(r#"{"tool": "datetime"}"#);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name, "datetime");
        assert_eq!(calls[0].arguments, "{}");
    }

    #[test]
    fn plain_text_has_no_tool_calls() {
        assert!(parse_text_tool_calls("The answer is 42.").is_empty());
    }
}

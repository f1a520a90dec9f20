//! Tool Invocation
//!
//! Executes a single [`ToolCall`]: lookup, argument decoding, validation,
//! dispatch and result normalization. Every outcome is a [`ToolResult`];
//! nothing attributable to one call is returned as an error.

use std::sync::Arc;

use tracing::Instrument;

use crate::error::{AgentError, Result};
use crate::telemetry::{self, Telemetry};
use crate::tool::{ToolArguments, ToolCall, ToolRegistry, ToolResult};

/// Runs tool calls against a registry
#[derive(Clone, Debug)]
pub struct ToolInvoker {
    registry: Arc<ToolRegistry>,
    telemetry: Telemetry,
}

impl ToolInvoker {
    pub const fn new(registry: Arc<ToolRegistry>, telemetry: Telemetry) -> Self {
        Self {
            registry,
            telemetry,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute one call and normalize the outcome
    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let span = self.telemetry.tool_span(call);
        let result = self.invoke_inner(call).instrument(span.clone()).await;

        if result.is_error {
            telemetry::record_error(&span, &result.content);
        } else {
            telemetry::record_ok(&span);
        }
        result
    }

    async fn invoke_inner(&self, call: &ToolCall) -> ToolResult {
        let tool = match self.registry.get(&call.name) {
            Ok(tool) => tool,
            Err(_) => return unknown_tool(call),
        };

        let arguments = match decode_arguments(call) {
            Ok(arguments) => arguments,
            Err(e) => {
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "Rejected tool arguments");
                return ToolResult::failure(call, e.to_string());
            }
        };

        let outcome = match tool.validate(&arguments) {
            Ok(()) => tool.execute(arguments).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(value) => {
                tracing::debug!(tool = %call.name, call_id = %call.id, "Tool succeeded");
                ToolResult::success(call, render_content(value))
            }
            Err(e) => {
                let message = format!("Error executing tool '{}': {e}", call.name);
                tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "Tool failed");
                ToolResult::failure(call, message)
            }
        }
    }
}

fn unknown_tool(call: &ToolCall) -> ToolResult {
    let message = format!("Error: Tool '{}' not found.", call.name);
    tracing::warn!(tool = %call.name, call_id = %call.id, "LLM requested an unknown tool");
    ToolResult::failure(call, message)
}

/// Decode the raw argument payload into a key-value mapping.
///
/// The payload must be a JSON object; an argument-less call sends `{}`.
pub fn decode_arguments(call: &ToolCall) -> Result<ToolArguments> {
    let value: serde_json::Value = serde_json::from_str(&call.arguments).map_err(|e| {
        AgentError::ToolArguments(format!(
            "Error decoding JSON arguments for tool '{}': {e}. Input: '{}'",
            call.name, call.arguments
        ))
    })?;

    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(AgentError::ToolArguments(format!(
            "Argument validation error for tool '{}': expected a JSON object, got {}. Input: '{}'",
            call.name,
            json_kind(&other),
            call.arguments
        ))),
    }
}

/// Strings pass through untouched; everything else is JSON-encoded
pub fn render_content(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => serde_json::to_string(&other).unwrap_or_else(|_| other.to_string()),
    }
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{multiply_registry, FailingTool};
    use serde_json::json;

    fn invoker(registry: ToolRegistry) -> ToolInvoker {
        ToolInvoker::new(Arc::new(registry), Telemetry::disabled())
    }

    #[tokio::test]
    async fn multiply_six_by_seven() {
        let invoker = invoker(multiply_registry());
        let call = ToolCall::new("c1", "multiply", r#"{"a": 6, "b": 7}"#);

        let result = invoker.invoke(&call).await;

        assert!(!result.is_error, "{}", result.content);
        assert_eq!(result.call_id, "c1");
        assert_eq!(result.tool_name, "multiply");
        let content: serde_json::Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(content, json!({"product": 42}));
    }

    #[tokio::test]
    async fn identical_calls_to_pure_tool_give_identical_content() {
        let invoker = invoker(multiply_registry());
        let call = ToolCall::new("c1", "multiply", r#"{"a": 3, "b": 5}"#);

        let first = invoker.invoke(&call).await;
        let second = invoker.invoke(&call).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let invoker = invoker(multiply_registry());
        let call = ToolCall::new("c1", "divide", r#"{"a": 6}"#);

        let result = invoker.invoke(&call).await;

        assert!(result.is_error);
        assert_eq!(result.call_id, "c1");
        assert!(result.content.contains("'divide' not found"));
    }

    #[tokio::test]
    async fn malformed_arguments_are_an_error_result() {
        let invoker = invoker(multiply_registry());

        for raw in [r#"{"a": 6, "b":"#, "[6, 7]", "42", r#""text""#] {
            let call = ToolCall::new("c1", "multiply", raw);
            let result = invoker.invoke(&call).await;
            assert!(result.is_error, "payload {raw} should be rejected");
            assert!(result.content.contains("multiply"));
        }
    }

    #[tokio::test]
    async fn missing_required_argument_is_an_error_result() {
        let invoker = invoker(multiply_registry());
        let call = ToolCall::new("c1", "multiply", r#"{"a": 6}"#);

        let result = invoker.invoke(&call).await;

        assert!(result.is_error);
        assert!(result.content.contains("Missing required parameter: b"));
    }

    #[tokio::test]
    async fn tool_failure_carries_message() {
        let mut registry = ToolRegistry::new();
        registry.register(FailingTool);
        let call = ToolCall::new("c1", "explode", "{}");

        let result = invoker(registry).invoke(&call).await;

        assert!(result.is_error);
        assert_eq!(
            result.content,
            "Error executing tool 'explode': Tool execution error: kaboom"
        );
    }

    #[tokio::test]
    async fn blank_arguments_are_an_error_result() {
        let invoker = invoker(multiply_registry());

        for raw in ["", "   "] {
            let call = ToolCall::new("c1", "multiply", raw);
            let result = invoker.invoke(&call).await;
            assert!(result.is_error, "blank payload {raw:?} should be rejected");
            assert!(result.content.contains("Error decoding JSON arguments"));
        }
    }

    #[test]
    fn empty_object_decodes_to_empty_map() {
        let call = ToolCall::new("c1", "datetime", "{}");
        assert!(decode_arguments(&call).unwrap().is_empty());
        assert!(matches!(
            decode_arguments(&ToolCall::new("c1", "datetime", "")),
            Err(AgentError::ToolArguments(_))
        ));
    }

    #[test]
    fn render_content_serializes_non_strings() {
        assert_eq!(render_content(json!("plain")), "plain");
        assert_eq!(render_content(json!(42)), "42");
        assert_eq!(render_content(json!({"product": 42})), r#"{"product":42}"#);
    }
}

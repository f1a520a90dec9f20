//! Tool System
//!
//! Tools are registered by name and invoked by the agent loop through the
//! [`ToolInvoker`](crate::invoker::ToolInvoker). A tool is either
//! suspension-capable (implement [`Tool`] directly) or a plain synchronous
//! closure wrapped in [`FunctionTool`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AgentError, Result};

/// Decoded tool arguments: a JSON object keyed by parameter name.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// Tool call request from the LLM
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation token, unique within one LLM turn
    pub id: String,

    /// Tool identifier
    pub name: String,

    /// Raw encoded argument payload (JSON text)
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Build a call with a freshly generated id
    pub fn generated(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), name, arguments)
    }
}

/// Result from tool execution
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the originating [`ToolCall`]
    pub call_id: String,

    /// Tool that was called
    pub tool_name: String,

    /// Success payload or human-readable error
    pub content: String,

    /// Whether execution failed
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn failure(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            content: error.into(),
            is_error: true,
        }
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON Schema type (string, number, integer, boolean, object, array)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,

    /// Default value if not provided
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,

    /// Enum of allowed values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<serde_json::Value>>,
}

impl ParameterSchema {
    /// A required parameter without default or enum constraint
    pub fn required(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
            default: None,
            enum_values: None,
        }
    }

    /// An optional parameter
    pub fn optional(
        name: impl Into<String>,
        param_type: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }

    fn to_json_schema(&self) -> serde_json::Value {
        let mut property = serde_json::json!({
            "type": self.param_type,
            "description": self.description,
        });
        if let Some(default) = &self.default {
            property["default"] = default.clone();
        }
        if let Some(values) = &self.enum_values {
            property["enum"] = serde_json::Value::Array(values.clone());
        }
        property
    }
}

/// Tool definition schema (for LLM function calling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to LLM)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,

    /// Category for grouping
    #[serde(default)]
    pub category: Option<String>,

    /// Whether tool has side effects
    #[serde(default)]
    pub has_side_effects: bool,
}

impl ToolSchema {
    /// Render as a function-calling tool spec:
    /// `{"type": "function", "function": {name, description, parameters}}`
    pub fn to_function_spec(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|p| (p.name.clone(), p.to_json_schema()))
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();

        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                },
            },
        })
    }
}

/// Tool trait - implement to add new capabilities
///
/// `execute` receives arguments that already decoded to a JSON object.
/// Returning `Err` is the normal way to report a failure; the invoker turns it
/// into an error [`ToolResult`] the LLM can read.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema for LLM function calling
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with decoded arguments
    async fn execute(&self, arguments: ToolArguments) -> Result<serde_json::Value>;

    /// Validate arguments before execution (optional)
    fn validate(&self, arguments: &ToolArguments) -> Result<()> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && !arguments.contains_key(&param.name) {
                return Err(AgentError::ToolValidation(format!(
                    "Missing required parameter: {}",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Decode tool arguments into a typed request
pub fn parse_arguments<T: DeserializeOwned>(arguments: ToolArguments) -> Result<T> {
    serde_json::from_value(serde_json::Value::Object(arguments))
        .map_err(|e| AgentError::ToolValidation(e.to_string()))
}

/// Synchronous tool backed by a closure
pub struct FunctionTool<F> {
    schema: ToolSchema,
    func: F,
}

impl<F> FunctionTool<F>
where
    F: Fn(ToolArguments) -> Result<serde_json::Value> + Send + Sync,
{
    pub const fn new(schema: ToolSchema, func: F) -> Self {
        Self { schema, func }
    }
}

#[async_trait]
impl<F> Tool for FunctionTool<F>
where
    F: Fn(ToolArguments) -> Result<serde_json::Value> + Send + Sync,
{
    fn schema(&self) -> ToolSchema {
        self.schema.clone()
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<serde_json::Value> {
        (self.func)(arguments)
    }
}

/// Registry for available tools
///
/// Registering a name twice replaces the earlier tool and logs a warning.
/// Keeping names unique is the caller's responsibility.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its schema name
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        let name = tool.schema().name;
        self.register_as(name, Arc::new(tool));
    }

    /// Register a shared tool under an explicit name
    pub fn register_as(&mut self, name: impl Into<String>, tool: Arc<dyn Tool>) {
        let name = name.into();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "Tool already registered, overwriting");
        } else {
            tracing::debug!(tool = %name, "Tool registered");
        }
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| AgentError::ToolNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool schemas, sorted by name
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut schemas: Vec<ToolSchema> = self.tools.values().map(|t| t.schema()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Text description of the tools for models without native tool calling
    pub fn tool_prompt_section(&self) -> String {
        tool_prompt_section(&self.schemas())
    }
}

/// Render tool schemas as a system prompt section that asks the model to
/// answer with fenced `tool` blocks (see [`crate::provider::parse_text_tool_calls`]).
pub fn tool_prompt_section(schemas: &[ToolSchema]) -> String {
    let mut prompt = String::from("## Available Tools\n\n");
    prompt.push_str("You can use the following tools by responding with a JSON block:\n\n");
    prompt.push_str("```tool\n{\"tool\": \"tool_name\", \"arguments\": {\"arg\": \"value\"}}\n```\n\n");
    prompt.push_str("Emit one block per tool call. After receiving tool results, answer the user.\n\n");

    for schema in schemas {
        prompt.push_str(&format!("### {}\n{}\n", schema.name, schema.description));

        if !schema.parameters.is_empty() {
            prompt.push_str("**Parameters:**\n");
            for param in &schema.parameters {
                let required = if param.required { " (required)" } else { "" };
                prompt.push_str(&format!(
                    "- `{}` ({}){}: {}\n",
                    param.name, param.param_type, required, param.description
                ));
            }
        }
        prompt.push('\n');
    }

    prompt
}

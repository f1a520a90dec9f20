//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` over Ollama's HTTP API (`/api/chat`,
//! non-streaming). Tools are passed natively as function specs, or, for
//! models without tool support, described in a system prompt section and
//! parsed back out of the reply text.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        parse_text_tool_calls, Completion, FinishReason, GenerationOptions, LlmProvider,
        ModelInfo, TokenUsage,
    },
    tool::{tool_prompt_section, ToolCall, ToolSchema},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Ollama host URL
    pub host: String,

    /// Ollama port
    pub port: u16,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Pass tools as function specs instead of the text protocol
    pub native_tools: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost".into(),
            port: 11434,
            timeout_secs: 120,
            native_tools: true,
        }
    }
}

impl OllamaConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var("OLLAMA_HOST").unwrap_or(defaults.host);
        let port = std::env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(defaults.port);
        let native_tools = std::env::var("OLLAMA_NATIVE_TOOLS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.native_tools);

        Self {
            host,
            port,
            native_tools,
            ..defaults
        }
    }

    pub fn base_url(&self) -> String {
        format!("{}:{}", self.host.trim_end_matches('/'), self.port)
    }
}

// Wire types for /api/chat and /api/tags

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    function: ChatFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    message: ChatMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    #[serde(default)]
    model: Option<String>,
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider with custom host/port
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self> {
        Self::from_config(OllamaConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OllamaConfig::default())
    }

    pub const fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url())
    }

    /// Convert agent messages to Ollama format
    fn convert_messages(messages: &[Message], native_tools: bool) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = if native_tools {
                    m.tool_calls.iter().map(to_chat_tool_call).collect()
                } else {
                    Vec::new()
                };
                let tool_name = if m.role == Role::Tool {
                    m.name.clone()
                } else {
                    None
                };

                ChatMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                    tool_calls,
                    tool_name,
                }
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> ChatRequest {
        let native = self.config.native_tools;
        let mut chat_messages = Self::convert_messages(messages, native);

        let tools = if native {
            tools.iter().map(ToolSchema::to_function_spec).collect()
        } else {
            if !tools.is_empty() {
                chat_messages.insert(
                    0,
                    ChatMessage {
                        role: Role::System.to_string(),
                        content: tool_prompt_section(tools),
                        tool_calls: Vec::new(),
                        tool_name: None,
                    },
                );
            }
            Vec::new()
        };

        ChatRequest {
            model: options.model.clone(),
            messages: chat_messages,
            tools,
            stream: false,
            options: ChatOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.max_tokens,
                stop: options.stop_sequences.clone(),
            },
        }
    }

    /// Convert Ollama response to agent completion
    fn convert_completion(&self, response: ChatResponse, model: &str) -> Completion {
        let ChatResponse {
            model: response_model,
            message,
            done_reason,
            prompt_eval_count,
            eval_count,
        } = response;

        let tool_calls: Vec<ToolCall> = if self.config.native_tools {
            message
                .tool_calls
                .into_iter()
                .map(|call| {
                    // Argument-less calls may arrive without an arguments field
                    let arguments = if call.function.arguments.is_null() {
                        "{}".to_string()
                    } else {
                        call.function.arguments.to_string()
                    };
                    ToolCall::generated(call.function.name, arguments)
                })
                .collect()
        } else {
            parse_text_tool_calls(&message.content)
        };

        let usage = match (prompt_eval_count, eval_count) {
            (None, None) => None,
            (prompt, completion) => {
                let prompt_tokens = prompt.unwrap_or(0);
                let completion_tokens = completion.unwrap_or(0);
                Some(TokenUsage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                })
            }
        };

        let finish_reason = if tool_calls.is_empty() {
            Some(match done_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            })
        } else {
            Some(FinishReason::ToolUse)
        };

        let content = Some(message.content).filter(|c| !c.is_empty());

        Completion {
            content,
            tool_calls,
            model: if response_model.is_empty() {
                model.to_string()
            } else {
                response_model
            },
            usage,
            finish_reason,
        }
    }
}

fn to_chat_tool_call(call: &ToolCall) -> ChatToolCall {
    let arguments = serde_json::from_str(&call.arguments)
        .unwrap_or_else(|_| Value::String(call.arguments.clone()));
    ChatToolCall {
        function: ChatFunction {
            name: call.name.clone(),
            arguments,
        },
    }
}

fn request_error(e: &reqwest::Error) -> AgentError {
    if e.is_connect() || e.is_timeout() {
        AgentError::ProviderUnavailable(e.to_string())
    } else {
        AgentError::Provider(e.to_string())
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = self.build_request(messages, tools, options);
        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending chat request to Ollama"
        );

        let response = self
            .client
            .post(self.url("/api/chat"))
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Provider(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Invalid Ollama response: {e}")))?;

        Ok(self.convert_completion(chat, &options.model))
    }

    async fn health_check(&self) -> Result<bool> {
        match self.client.get(self.url("/api/tags")).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let tags: TagsResponse = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| AgentError::ProviderUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| request_error(&e))?
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Invalid Ollama response: {e}")))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                id: m.model.unwrap_or_else(|| m.name.clone()),
                name: m.name,
                context_length: None, // Not exposed by /api/tags
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::tool::{ParameterSchema, ToolResult};
    use serde_json::json;

    fn provider(native_tools: bool) -> OllamaProvider {
        OllamaProvider::from_config(OllamaConfig {
            native_tools,
            ..Default::default()
        })
        .unwrap()
    }

    fn multiply_schema() -> ToolSchema {
        ToolSchema {
            name: "multiply".into(),
            description: "Multiply two integers".into(),
            parameters: vec![
                ParameterSchema::required("a", "integer", "First factor"),
                ParameterSchema::required("b", "integer", "Second factor"),
            ],
            category: None,
            has_side_effects: false,
        }
    }

    fn response(body: Value) -> ChatResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = OllamaConfig::default();
        assert_eq!(config.host, "http://localhost");
        assert_eq!(config.port, 11434);
        assert!(config.native_tools);
        assert_eq!(config.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_message_conversion() {
        let call = ToolCall::new("c1", "multiply", r#"{"a":6,"b":7}"#);
        let result = ToolResult::success(&call, r#"{"product":42}"#);
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("6 times 7?"),
            Message::assistant_turn(None, vec![call]),
            Message::tool_result(&result),
        ];

        let converted = OllamaProvider::convert_messages(&messages, true);

        assert_eq!(converted.len(), 4);
        assert_eq!(converted[2].role, "assistant");
        assert_eq!(converted[2].tool_calls[0].function.arguments, json!({"a": 6, "b": 7}));
        assert_eq!(converted[3].role, "tool");
        assert_eq!(converted[3].tool_name.as_deref(), Some("multiply"));
    }

    #[test]
    fn native_request_carries_function_specs() {
        let provider = provider(true);
        let request = provider.build_request(
            &[Message::user("hi")],
            &[multiply_schema()],
            &GenerationOptions::default(),
        );

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["tools"][0]["function"]["name"], json!("multiply"));
        assert_eq!(body["options"]["num_predict"], json!(2048));
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn text_protocol_request_injects_tool_prompt() {
        let provider = provider(false);
        let request = provider.build_request(
            &[Message::user("hi")],
            &[multiply_schema()],
            &GenerationOptions::default(),
        );

        assert!(request.tools.is_empty());
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, "system");
        assert!(request.messages[0].content.contains("### multiply"));
    }

    #[test]
    fn native_tool_calls_are_mapped() {
        let completion = provider(true).convert_completion(
            response(json!({
                "model": "llama3.2",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [
                        {"function": {"name": "multiply", "arguments": {"a": 6, "b": 7}}}
                    ]
                },
                "done": true,
                "prompt_eval_count": 20,
                "eval_count": 5
            })),
            "llama3.2",
        );

        assert!(completion.content.is_none());
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "multiply");
        assert!(!completion.tool_calls[0].id.is_empty());
        let args: Value = serde_json::from_str(&completion.tool_calls[0].arguments).unwrap();
        assert_eq!(args, json!({"a": 6, "b": 7}));
        assert_eq!(completion.finish_reason, Some(FinishReason::ToolUse));
        assert_eq!(completion.usage.unwrap().total_tokens, 25);
    }

    #[test]
    fn missing_native_arguments_become_empty_object() {
        let completion = provider(true).convert_completion(
            response(json!({
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{"function": {"name": "datetime"}}]
                }
            })),
            "llama3.2",
        );

        assert_eq!(completion.tool_calls[0].arguments, "{}");
    }

    #[test]
    fn text_tool_calls_are_parsed_without_native_support() {
        let content = "Let me compute.\n```tool\n{\"tool\": \"multiply\", \"arguments\": {\"a\": 2, \"b\": 3}}\n```";
        let completion = provider(false).convert_completion(
            response(json!({
                "message": {"role": "assistant", "content": content},
                "done": true
            })),
            "llama3.2",
        );

        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.model, "llama3.2");
        assert!(completion.usage.is_none());
    }

    #[test]
    fn plain_answer_maps_to_text() {
        let completion = provider(true).convert_completion(
            response(json!({
                "model": "qwen2.5",
                "message": {"role": "assistant", "content": "42"},
                "done_reason": "length"
            })),
            "llama3.2",
        );

        assert_eq!(completion.content.as_deref(), Some("42"));
        assert!(completion.tool_calls.is_empty());
        assert_eq!(completion.model, "qwen2.5");
        assert_eq!(completion.finish_reason, Some(FinishReason::Length));
    }

    #[tokio::test]
    async fn unreachable_server_reports_unhealthy() {
        let provider = OllamaProvider::from_config(OllamaConfig {
            host: "http://127.0.0.1".into(),
            port: 9,
            timeout_secs: 2,
            native_tools: true,
        })
        .unwrap();

        assert!(!provider.health_check().await.unwrap());
        let err = provider
            .generate(&[Message::user("hi")], &[], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}

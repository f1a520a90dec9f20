//! Gemini LLM Provider
//!
//! Implementation of `LlmProvider` over the Gemini REST API
//! (`models/{model}:generateContent`). Tools always go through the
//! fenced-block text protocol: they are described in the system
//! instruction and parsed back out of the reply text.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        parse_text_tool_calls, Completion, FinishReason, GenerationOptions, LlmProvider,
        ModelInfo, TokenUsage,
    },
    tool::{tool_prompt_section, ToolSchema},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key sent with every request
    pub api_key: String,

    /// API root, without the version segment
    pub base_url: String,

    /// Model used when the generation options name none
    pub default_model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            default_model: "gemini-2.0-flash".into(),
            timeout_secs: 120,
        }
    }

    /// Read `GEMINI_API_KEY` (required), `GEMINI_BASE_URL` and `GEMINI_MODEL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AgentError::Config("GEMINI_API_KEY is not set".into()))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.default_model = model;
        }
        Ok(config)
    }
}

// Wire types for generateContent and models

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    models: Vec<GeminiModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModel {
    name: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    input_token_limit: Option<u32>,
}

fn text_content(role: &str, text: impl Into<String>) -> Content {
    Content {
        role: Some(role.into()),
        parts: vec![Part { text: text.into() }],
    }
}

/// Gemini LLM provider
pub struct GeminiProvider {
    client: reqwest::Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::from_config(GeminiConfig::new(api_key))
    }

    pub fn from_config(config: GeminiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::from_config(GeminiConfig::from_env()?)
    }

    pub const fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1beta/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn model<'a>(&'a self, options: &'a GenerationOptions) -> &'a str {
        let model = options.model.trim();
        if model.is_empty() {
            &self.config.default_model
        } else {
            model
        }
    }

    /// System messages and the tool section become the system instruction;
    /// tool results are replayed as user turns.
    fn build_request(
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> GenerateRequest {
        let mut system = Vec::new();
        let mut contents = Vec::new();

        for message in messages {
            match message.role {
                Role::System => system.push(Part {
                    text: message.content.clone(),
                }),
                Role::User => contents.push(text_content("user", message.content.clone())),
                Role::Assistant => contents.push(text_content("model", message.content.clone())),
                Role::Tool => {
                    let name = message.name.as_deref().unwrap_or("tool");
                    contents.push(text_content(
                        "user",
                        format!("Tool result ({name}): {}", message.content),
                    ));
                }
            }
        }

        if !tools.is_empty() {
            system.push(Part {
                text: tool_prompt_section(tools),
            });
        }

        GenerateRequest {
            system_instruction: (!system.is_empty()).then(|| Content {
                role: None,
                parts: system,
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: options.temperature,
                top_p: options.top_p,
                max_output_tokens: options.max_tokens,
                stop_sequences: options.stop_sequences.clone(),
            },
        }
    }

    fn convert_completion(response: GenerateResponse, model: &str) -> Result<Completion> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Provider("Gemini returned no candidates".into()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        let tool_calls = parse_text_tool_calls(&text);

        let finish_reason = if tool_calls.is_empty() {
            Some(match candidate.finish_reason.as_deref() {
                Some("MAX_TOKENS") => FinishReason::Length,
                Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT") => {
                    FinishReason::ContentFilter
                }
                _ => FinishReason::Stop,
            })
        } else {
            Some(FinishReason::ToolUse)
        };

        Ok(Completion {
            content: Some(text).filter(|t| !t.is_empty()),
            tool_calls,
            model: response.model_version.unwrap_or_else(|| model.to_string()),
            usage: response.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            }),
            finish_reason,
        })
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
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let model = self.model(options);
        let request = Self::build_request(messages, tools, options);
        tracing::debug!(
            model,
            contents = request.contents.len(),
            tools = tools.len(),
            "Sending generateContent request to Gemini"
        );

        let response = self
            .client
            .post(self.url(&format!("models/{model}:generateContent")))
            .header(API_KEY_HEADER, &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, "Gemini API error");
            return Err(AgentError::Provider(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Invalid Gemini response: {e}")))?;

        Self::convert_completion(body, model)
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(self.url("models"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("Gemini health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let models: ModelsResponse = self
            .client
            .get(self.url("models"))
            .header(API_KEY_HEADER, &self.config.api_key)
            .send()
            .await
            .map_err(|e| request_error(&e))?
            .error_for_status()
            .map_err(|e| request_error(&e))?
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("Invalid Gemini response: {e}")))?;

        Ok(models
            .models
            .into_iter()
            .map(|m| {
                let id = m
                    .name
                    .strip_prefix("models/")
                    .unwrap_or(&m.name)
                    .to_string();
                ModelInfo {
                    name: m.display_name.unwrap_or_else(|| id.clone()),
                    id,
                    context_length: m.input_token_limit,
                }
            })
            .collect())
    }
}

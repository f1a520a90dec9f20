//! Reasoning Loop
//!
//! The iterate / call / dispatch / fold state machine:
//!
//! ```text
//!   AWAITING_LLM ──(no tool calls)──────────────► FINAL_ANSWER
//!        │
//!        └──(tool calls)──► TOOL_CALLS_REQUESTED ──► AWAITING_LLM
//!
//!   after max_iterations LLM calls ──────────────► MAX_ITERATIONS_REACHED
//! ```
//!
//! Every LLM call is bounded by `max_iterations`, so a run terminates no
//! matter what the model does. LLM failures propagate to the caller; tool
//! failures come back as error results the model can react to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::dispatch::ToolDispatcher;
use crate::error::Result;
use crate::message::{Conversation, Message};
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::telemetry::{self, Telemetry};
use crate::tool::{ToolCall, ToolResult, ToolSchema};

/// Output used when the model returns neither text nor tool calls
pub const EMPTY_RESPONSE_OUTPUT: &str = "No content received.";

/// Output used when the iteration budget runs out
pub const MAX_ITERATIONS_OUTPUT: &str = "Agent reached maximum iterations.";

/// Agent configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System prompt, inserted once at the front of the conversation
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Maximum LLM calls per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Tool calls allowed in flight at once; 1 means sequential
    #[serde(default = "default_max_tool_concurrency")]
    pub max_tool_concurrency: usize,

    /// Emit spans for runs, iterations, LLM calls and tools
    #[serde(default)]
    pub enable_tracing: bool,

    /// Name used in spans and logs
    #[serde(default = "default_agent_name")]
    pub agent_name: String,

    /// Generation options
    #[serde(default)]
    pub generation: GenerationOptions,
}

const fn default_max_iterations() -> usize {
    3
}
const fn default_max_tool_concurrency() -> usize {
    1
}
fn default_agent_name() -> String {
    "ToolAgent".into()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_iterations: default_max_iterations(),
            max_tool_concurrency: default_max_tool_concurrency(),
            enable_tracing: false,
            agent_name: default_agent_name(),
            generation: GenerationOptions::default(),
        }
    }
}

/// One entry of the run log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum IntermediateStep {
    /// Tool calls the model asked for in one turn
    LlmToolRequest(Vec<ToolCall>),
    /// Results of that turn's dispatch, in call order
    ToolResults(Vec<ToolResult>),
}

/// Terminal output of a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Effective conversation id
    pub conversation_id: String,

    /// Final text
    pub output: String,

    /// Tool requests and results, in iteration order
    pub intermediate_steps: Vec<IntermediateStep>,

    /// Set when the run failed and `output` describes the failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AgentResponse {
    pub fn new(
        conversation_id: impl Into<String>,
        output: impl Into<String>,
        intermediate_steps: Vec<IntermediateStep>,
    ) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            output: output.into(),
            intermediate_steps,
            error: None,
        }
    }

    /// Best-effort response for a run that failed
    pub fn failed(conversation_id: impl Into<String>, error: impl std::fmt::Display) -> Self {
        let error = error.to_string();
        Self {
            conversation_id: conversation_id.into(),
            output: format!("An error occurred: {error}"),
            intermediate_steps: Vec::new(),
            error: Some(error),
        }
    }

    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// What one LLM turn asks the loop to do next
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    FinalAnswer(String),
    ToolCallsRequested(Vec<ToolCall>),
}

impl TurnOutcome {
    /// Classify a completion. Empty or whitespace-only text becomes
    /// [`EMPTY_RESPONSE_OUTPUT`].
    pub fn from_completion(completion: &Completion) -> Self {
        if completion.tool_calls.is_empty() {
            let text = completion
                .content
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(EMPTY_RESPONSE_OUTPUT);
            Self::FinalAnswer(text.to_string())
        } else {
            Self::ToolCallsRequested(completion.tool_calls.clone())
        }
    }
}

/// Drives LLM calls and tool dispatch over a conversation
pub struct AgentLoop {
    provider: Arc<dyn LlmProvider>,
    dispatcher: ToolDispatcher,
    tool_schemas: Vec<ToolSchema>,
    config: AgentConfig,
    telemetry: Telemetry,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        dispatcher: ToolDispatcher,
        config: AgentConfig,
        telemetry: Telemetry,
    ) -> Self {
        let tool_schemas = dispatcher.invoker().registry().schemas();
        Self {
            provider,
            dispatcher,
            tool_schemas,
            config,
            telemetry,
        }
    }

    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    /// Run the loop for one user input.
    ///
    /// Returns `Err` only when the LLM call fails; reaching the iteration
    /// bound is a normal outcome.
    pub async fn run(
        &self,
        conversation: &mut Conversation,
        user_input: &str,
        conversation_id: &str,
    ) -> Result<AgentResponse> {
        if let Some(prompt) = &self.config.system_prompt {
            conversation.ensure_system_prompt(prompt);
        }
        conversation.reset_iterations();
        conversation.push(Message::user(user_input));

        let mut steps = Vec::new();

        while conversation.iterations() < self.config.max_iterations {
            let iteration = conversation.begin_iteration();
            let span = self.telemetry.iteration_span(conversation_id, iteration);

            let outcome = self
                .turn(conversation, &mut steps)
                .instrument(span.clone())
                .await;

            match outcome {
                Ok(TurnOutcome::FinalAnswer(output)) => {
                    telemetry::record_ok(&span);
                    tracing::debug!(conversation_id, iteration, "Final answer received");
                    return Ok(AgentResponse::new(conversation_id, output, steps));
                }
                Ok(TurnOutcome::ToolCallsRequested(calls)) => {
                    span.record("tool_calls", calls.len());
                    telemetry::record_ok(&span);
                }
                Err(e) => {
                    telemetry::record_error(&span, &e);
                    return Err(e);
                }
            }
        }

        tracing::warn!(
            conversation_id,
            max_iterations = self.config.max_iterations,
            "Agent reached maximum iterations"
        );
        Ok(AgentResponse::new(conversation_id, MAX_ITERATIONS_OUTPUT, steps))
    }

    /// One AWAITING_LLM step plus, if requested, the tool dispatch that follows
    async fn turn(
        &self,
        conversation: &mut Conversation,
        steps: &mut Vec<IntermediateStep>,
    ) -> Result<TurnOutcome> {
        let completion = self.call_llm(conversation).await?;

        conversation.push(Message::assistant_turn(
            completion.content.clone(),
            completion.tool_calls.clone(),
        ));

        let outcome = TurnOutcome::from_completion(&completion);
        if let TurnOutcome::ToolCallsRequested(calls) = &outcome {
            tracing::debug!(calls = calls.len(), "LLM requested tools");
            steps.push(IntermediateStep::LlmToolRequest(calls.clone()));

            let results = self
                .dispatcher
                .dispatch(calls, self.config.max_tool_concurrency)
                .await;

            conversation.extend(results.iter().map(Message::tool_result));
            steps.push(IntermediateStep::ToolResults(results));
        }

        Ok(outcome)
    }

    async fn call_llm(&self, conversation: &Conversation) -> Result<Completion> {
        let span = self
            .telemetry
            .llm_span(&self.config.generation.model, conversation.len());

        let result = self
            .provider
            .generate(
                conversation.messages(),
                &self.tool_schemas,
                &self.config.generation,
            )
            .instrument(span.clone())
            .await;

        match &result {
            Ok(_) => telemetry::record_ok(&span),
            Err(e) => {
                telemetry::record_error(&span, e);
                tracing::warn!(provider = self.provider.name(), error = %e, "LLM call failed");
            }
        }
        result
    }
}

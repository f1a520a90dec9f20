//! Agent Facade
//!
//! Public entry point. [`Agent::run`] resolves the conversation id, hydrates
//! and persists history through an optional [`MemoryStore`], and turns any
//! failure of the loop into an [`AgentResponse`]. It never returns an error.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::Instrument;

use crate::dispatch::ToolDispatcher;
use crate::error::{AgentError, Result};
use crate::invoker::ToolInvoker;
use crate::memory::MemoryStore;
use crate::message::{Conversation, Message};
use crate::provider::LlmProvider;
use crate::reasoning::{AgentConfig, AgentLoop, AgentResponse};
use crate::telemetry::{self, Telemetry};
use crate::tool::{Tool, ToolRegistry};

/// The main Agent struct
///
/// Owns the in-process conversation. `run` takes `&mut self`, so two runs
/// cannot share one instance concurrently; use one agent per conversation.
pub struct Agent {
    engine: AgentLoop,
    memory: Option<Arc<dyn MemoryStore>>,
    conversation: Conversation,
    default_conversation_id: Option<String>,
    telemetry: Telemetry,
}

impl Agent {
    /// Create a new agent
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        let telemetry = Telemetry::new(config.agent_name.clone(), config.enable_tracing);
        let invoker = ToolInvoker::new(tools, telemetry.clone());
        let dispatcher = ToolDispatcher::new(invoker, telemetry.clone());

        Self {
            engine: AgentLoop::new(provider, dispatcher, config, telemetry.clone()),
            memory: None,
            conversation: Conversation::new(),
            default_conversation_id: None,
            telemetry,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    pub fn builder() -> AgentBuilder {
        AgentBuilder::new()
    }

    /// Run the agent on one user message.
    ///
    /// The conversation id is `conversation_id`, else the agent's default
    /// (ambient) id, else a fresh UUID.
    pub async fn run(&mut self, user_input: &str, conversation_id: Option<&str>) -> AgentResponse {
        let conversation_id = self.resolve_conversation_id(conversation_id);
        let span = self.telemetry.run_span(&conversation_id, user_input);

        let response = self
            .run_contained(user_input, &conversation_id)
            .instrument(span.clone())
            .await;

        span.record("output.value", response.output.as_str());
        match &response.error {
            Some(error) => telemetry::record_error(&span, error),
            None => telemetry::record_ok(&span),
        }
        response
    }

    async fn run_contained(&mut self, user_input: &str, conversation_id: &str) -> AgentResponse {
        self.hydrate(conversation_id).await;

        let outcome = AssertUnwindSafe(self.engine.run(
            &mut self.conversation,
            user_input,
            conversation_id,
        ))
        .catch_unwind()
        .await;

        match outcome {
            Ok(Ok(response)) => {
                self.persist(conversation_id).await;
                response
            }
            Ok(Err(e)) => {
                tracing::error!(conversation_id, error = %e, "Agent run failed");
                AgentResponse::failed(conversation_id, e)
            }
            Err(_) => {
                let e = AgentError::Other("agent loop panicked".into());
                tracing::error!(conversation_id, error = %e, "Agent run failed");
                AgentResponse::failed(conversation_id, e)
            }
        }
    }

    fn resolve_conversation_id(&self, explicit: Option<&str>) -> String {
        explicit
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| self.default_conversation_id.clone())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }

    /// Load history when the in-process conversation is empty. A failed load
    /// starts from an empty history.
    async fn hydrate(&mut self, conversation_id: &str) {
        let Some(memory) = &self.memory else { return };
        if !self.conversation.is_empty() {
            return;
        }

        match memory.get_history(conversation_id).await {
            Ok(history) => {
                tracing::debug!(conversation_id, messages = history.len(), "Hydrated history");
                self.conversation = Conversation::from_messages(history);
            }
            Err(e) => {
                tracing::warn!(conversation_id, error = %e, "Failed to load history, starting empty");
            }
        }
    }

    async fn persist(&self, conversation_id: &str) {
        let Some(memory) = &self.memory else { return };

        if let Err(e) = memory
            .save_history(conversation_id, self.conversation.messages())
            .await
        {
            tracing::warn!(conversation_id, error = %e, "Failed to save history");
        }
    }

    /// In-process conversation history
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        self.engine.config()
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: ToolRegistry,
    shared_tools: Option<Arc<ToolRegistry>>,
    memory: Option<Arc<dyn MemoryStore>>,
    conversation_id: Option<String>,
    history: Vec<Message>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: ToolRegistry::new(),
            shared_tools: None,
            memory: None,
            conversation_id: None,
            history: Vec::new(),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tool<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Use a registry shared with other agents; overrides `tool`/`tools`
    pub fn shared_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.shared_tools = Some(tools);
        self
    }

    pub fn memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Ambient conversation id used when `run` is not given one
    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Seed the in-process history
    pub fn history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub const fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub const fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub const fn max_tool_concurrency(mut self, max: usize) -> Self {
        self.config.max_tool_concurrency = max;
        self
    }

    pub const fn enable_tracing(mut self, enabled: bool) -> Self {
        self.config.enable_tracing = enabled;
        self
    }

    pub fn agent_name(mut self, name: impl Into<String>) -> Self {
        self.config.agent_name = name.into();
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;

        if self.config.max_iterations == 0 {
            return Err(AgentError::Config(
                "max_iterations must be at least 1".into(),
            ));
        }

        let tools = self.shared_tools.unwrap_or_else(|| Arc::new(self.tools));
        let mut agent = Agent::new(provider, tools, self.config);
        agent.memory = self.memory;
        agent.default_conversation_id = self.conversation_id;
        agent.conversation = Conversation::from_messages(self.history);
        Ok(agent)
    }
}

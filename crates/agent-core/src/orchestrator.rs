//! Workflow Orchestrator
//!
//! Holds the tools, agents and chains of an application under string keys
//! and runs chains by name. Agents are registered as [`AgentTemplate`]s and
//! built fresh for every step, so concurrent workflows never share an
//! in-process conversation; history carries over through the template's
//! memory store.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::Instrument;

use crate::agent::Agent;
use crate::chain::{Chain, ChainOutput, WorkflowContext};
use crate::error::{AgentError, Result};
use crate::memory::MemoryStore;
use crate::provider::LlmProvider;
use crate::reasoning::AgentConfig;
use crate::tool::{Tool, ToolRegistry};

/// Per-run settings passed down to every step
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorkflowOptions {
    /// Conversation id handed to agent steps
    pub conversation_id: Option<String>,

    /// Overrides the model of every agent step
    pub model: Option<String>,
}

impl WorkflowOptions {
    pub fn conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Everything needed to build an agent for one step
#[derive(Clone)]
pub struct AgentTemplate {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    memory: Option<Arc<dyn MemoryStore>>,
    config: AgentConfig,
}

impl AgentTemplate {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        config: AgentConfig,
    ) -> Self {
        Self {
            provider,
            tools,
            memory: None,
            config,
        }
    }

    pub fn with_memory(mut self, memory: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(memory);
        self
    }

    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Build an agent, applying the options' model override
    pub fn build(&self, options: &WorkflowOptions) -> Result<Agent> {
        let mut builder = Agent::builder()
            .provider(Arc::clone(&self.provider))
            .shared_tools(Arc::clone(&self.tools))
            .config(self.config.clone());

        if let Some(memory) = &self.memory {
            builder = builder.memory(Arc::clone(memory));
        }
        if let Some(model) = &options.model {
            builder = builder.model(model.clone());
        }
        builder.build()
    }
}

/// Registries of tools, agents and chains
#[derive(Default)]
pub struct Orchestrator {
    tools: ToolRegistry,
    agents: HashMap<String, AgentTemplate>,
    chains: HashMap<String, Arc<dyn Chain>>,
}

impl Orchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tool registry
    pub fn with_tools(tools: ToolRegistry) -> Self {
        Self {
            tools,
            ..Self::default()
        }
    }

    pub fn register_tool<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.register(tool);
    }

    pub fn get_tool(&self, name: &str) -> Result<Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub const fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn register_agent(&mut self, key: impl Into<String>, template: AgentTemplate) {
        let key = key.into();
        if self.agents.insert(key.clone(), template).is_some() {
            tracing::warn!(agent = %key, "Agent already registered, overwriting");
        } else {
            tracing::debug!(agent = %key, "Agent registered");
        }
    }

    pub fn get_agent(&self, key: &str) -> Result<&AgentTemplate> {
        self.agents
            .get(key)
            .ok_or_else(|| AgentError::Workflow(format!("Agent '{key}' not found.")))
    }

    /// Register a chain under its own key
    pub fn register_chain<C: Chain + 'static>(&mut self, chain: C) {
        let key = chain.key().to_string();
        if self.chains.insert(key.clone(), Arc::new(chain)).is_some() {
            tracing::warn!(chain = %key, "Chain already registered, overwriting");
        } else {
            tracing::debug!(chain = %key, "Chain registered");
        }
    }

    pub fn get_chain(&self, key: &str) -> Result<Arc<dyn Chain>> {
        self.chains
            .get(key)
            .cloned()
            .ok_or_else(|| AgentError::Workflow(format!("Chain '{key}' not found.")))
    }

    /// Sorted chain keys
    pub fn chain_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.chains.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Run the chain registered as `chain_key`.
    ///
    /// Starts from `context` when given, else an empty one. Errors are
    /// logged and returned unchanged.
    pub async fn execute_workflow(
        &self,
        chain_key: &str,
        input: impl Into<Value> + Send,
        options: &WorkflowOptions,
        context: Option<WorkflowContext>,
    ) -> Result<ChainOutput> {
        let span = tracing::info_span!(
            "workflow",
            chain = chain_key,
            conversation_id = options.conversation_id.as_deref().unwrap_or("")
        );
        let input = input.into();

        let result: Result<ChainOutput> = async {
            let chain = self.get_chain(chain_key)?;
            let mut context = context.unwrap_or_default();

            tracing::info!("Executing workflow");
            chain.execute(self, input, options, &mut context).await
        }
        .instrument(span)
        .await;

        result.inspect_err(|e| tracing::error!(chain = chain_key, error = %e, "Workflow failed"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::chain::{AgentChain, ChainStep, SequentialChain};
    use crate::memory::InMemoryStore;
    use crate::provider::Completion;
    use crate::reasoning::IntermediateStep;
    use crate::testing::{multiply_call, multiply_registry, ScriptedProvider};

    fn assistant(provider: Arc<ScriptedProvider>, memory: Arc<InMemoryStore>) -> AgentTemplate {
        AgentTemplate::new(provider, Arc::new(multiply_registry()), AgentConfig::default())
            .with_memory(memory)
    }

    #[tokio::test]
    async fn agent_workflow_runs_tools_and_keeps_history() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Ok(Completion::tool_calls(vec![multiply_call("c1", 6, 7)])),
            Ok(Completion::text("The answer is 42.")),
            Ok(Completion::text("Still 42.")),
        ]));
        let memory = Arc::new(InMemoryStore::new());

        let mut orchestrator = Orchestrator::with_tools(multiply_registry());
        orchestrator.register_agent("assistant", assistant(provider.clone(), memory.clone()));
        let chain = AgentChain::new("ask", "assistant", &orchestrator).unwrap();
        orchestrator.register_chain(chain);

        let options = WorkflowOptions::default().conversation_id("conv-1");
        let first = orchestrator
            .execute_workflow("ask", "What is 6 times 7?", &options, None)
            .await
            .unwrap();

        assert_eq!(first.output, json!("The answer is 42."));
        let response = first.last_response().unwrap();
        assert_eq!(response.conversation_id, "conv-1");
        assert!(matches!(
            response.intermediate_steps.first(),
            Some(IntermediateStep::LlmToolRequest(_))
        ));

        let second = orchestrator
            .execute_workflow("ask", "And again?", &options, None)
            .await
            .unwrap();
        assert_eq!(second.output, json!("Still 42."));

        // The rebuilt agent saw the first exchange through memory
        let seen = provider.messages_seen(2);
        assert!(seen.iter().any(|m| m.content == "What is 6 times 7?"));
    }

    #[tokio::test]
    async fn unknown_chain_is_an_error() {
        let orchestrator = Orchestrator::new();
        let err = orchestrator
            .execute_workflow("missing", "hi", &WorkflowOptions::default(), None)
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Workflow error: Chain 'missing' not found.");
    }

    #[tokio::test]
    async fn caller_context_is_visible_to_steps() {
        let mut orchestrator = Orchestrator::with_tools(multiply_registry());
        orchestrator.register_chain(
            SequentialChain::new("preset", vec![ChainStep::tool("multiply").input_key("operands")])
                .unwrap(),
        );

        let mut context = WorkflowContext::new();
        context.insert("operands", json!({"a": 5, "b": 5}));

        let output = orchestrator
            .execute_workflow("preset", Value::Null, &WorkflowOptions::default(), Some(context))
            .await
            .unwrap();

        assert_eq!(output.output, json!({"product": 25}));
    }

    #[test]
    fn model_override_applies_to_built_agents() {
        let provider = Arc::new(ScriptedProvider::always(Completion::text("ok")));
        let template = assistant(provider, Arc::new(InMemoryStore::new()));

        assert!(template.build(&WorkflowOptions::default().model("llama3.1")).is_ok());
        assert_eq!(template.config().max_iterations, 3);
    }

    #[test]
    fn registries_report_missing_entries() {
        let orchestrator = Orchestrator::new();
        assert!(matches!(orchestrator.get_tool("multiply"), Err(AgentError::ToolNotFound(_))));
        assert!(matches!(orchestrator.get_agent("nobody"), Err(AgentError::Workflow(_))));
        assert!(orchestrator.chain_keys().is_empty());
    }
}

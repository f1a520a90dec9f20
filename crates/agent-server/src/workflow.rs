//! Tool agent workflow
//!
//! Wires the built-in tools and the tool agent into an [`Orchestrator`]
//! and registers the chain served by `/api/workflows/tool_agent`.

use std::sync::Arc;

use agent_core::{
    AgentChain, AgentConfig, AgentTemplate, LlmProvider, MemoryStore, Orchestrator, Result,
    ToolRegistry,
};

/// Agent key of the tool-using assistant
pub const TOOL_AGENT: &str = "tool_agent";

/// Chain key run by the tool agent endpoint
pub const TOOL_AGENT_CHAIN: &str = "tool_agent_workflow";

/// Build the orchestrator behind the tool agent endpoint
pub fn tool_agent_orchestrator(
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    memory: Arc<dyn MemoryStore>,
    config: AgentConfig,
) -> Result<Orchestrator> {
    let agent_tools = Arc::new(tools.clone());
    let mut orchestrator = Orchestrator::with_tools(tools);

    orchestrator.register_agent(
        TOOL_AGENT,
        AgentTemplate::new(provider, agent_tools, config).with_memory(memory),
    );

    let chain = AgentChain::new(TOOL_AGENT_CHAIN, TOOL_AGENT, &orchestrator)?;
    orchestrator.register_chain(chain);

    tracing::info!(
        chain = TOOL_AGENT_CHAIN,
        agent = TOOL_AGENT,
        tools = orchestrator.tools().len(),
        "Tool agent workflow registered"
    );
    Ok(orchestrator)
}

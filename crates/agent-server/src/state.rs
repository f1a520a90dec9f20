//! Application State

use std::sync::Arc;

use agent_core::{LlmProvider, Orchestrator};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// LLM provider (Ollama, etc.), used directly for health and model listing
    pub provider: Arc<dyn LlmProvider>,

    /// Tools, agents and chains served by the workflow endpoints
    pub orchestrator: Arc<Orchestrator>,
}

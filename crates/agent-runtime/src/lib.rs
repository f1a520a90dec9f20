//! # agent-runtime
//!
//! Runtime providers for the tool agent.
//!
//! ## Providers
//!
//! - **Ollama** (default): local inference over Ollama's `/api/chat`, with
//!   native tool calling or the fenced-block text protocol
//! - **Gemini** (`gemini` feature): Google's `generateContent` REST API,
//!   tools through the text protocol
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::ollama::OllamaProvider;
//!
//! let provider = OllamaProvider::new("http://localhost", 11434)?;
//! let mut agent = Agent::builder()
//!     .provider(Arc::new(provider))
//!     .tools(agent_tools::default_registry())
//!     .build()?;
//! ```

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "gemini")]
pub mod gemini;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

#[cfg(feature = "gemini")]
pub use gemini::{GeminiConfig, GeminiProvider};

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, AgentResponse, LlmProvider, Message, Result, Role, Tool,
    ToolRegistry,
};

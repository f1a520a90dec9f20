//! # agent-core
//!
//! Provider-agnostic tool-using agent: a bounded reasoning loop that asks an
//! LLM for the next step, runs the tools it requests and feeds the results
//! back until the model answers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            Agent                                 │
//! │   memory hydrate/save, conversation id, failure containment      │
//! │  ┌─────────────┐   ┌──────────────────┐   ┌──────────────────┐   │
//! │  │  AgentLoop  │──►│  ToolDispatcher  │──►│   ToolInvoker    │   │
//! │  │ (reasoning) │   │ (seq / bounded)  │   │ (lookup, decode) │   │
//! │  └──────┬──────┘   └──────────────────┘   └────────┬─────────┘   │
//! │         │                                          │             │
//! │  ┌──────▼──────┐                          ┌────────▼─────────┐   │
//! │  │ LlmProvider │                          │   ToolRegistry   │   │
//! │  └─────────────┘                          └──────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! An [`Orchestrator`] sits above agents: it registers tools, agent
//! templates and [`Chain`]s by name and runs a chain as a workflow.
//!
//! The `LlmProvider` trait enables swapping between Ollama or any other
//! provider without changing agent logic.

pub mod agent;
pub mod chain;
pub mod dispatch;
pub mod error;
pub mod invoker;
pub mod memory;
pub mod message;
pub mod orchestrator;
pub mod provider;
pub mod reasoning;
pub mod telemetry;
pub mod tool;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentBuilder};
pub use chain::{
    AgentChain, Chain, ChainOutput, ChainStep, SequentialChain, StepKind, WorkflowContext,
};
pub use dispatch::ToolDispatcher;
pub use error::{AgentError, Result};
pub use invoker::ToolInvoker;
pub use memory::{InMemoryStore, MemoryStore};
pub use message::{Conversation, Message, Role};
pub use orchestrator::{AgentTemplate, Orchestrator, WorkflowOptions};
pub use provider::{
    ensure_unique_call_ids, parse_text_tool_calls, Completion, FinishReason, GenerationOptions,
    LlmProvider, ModelInfo, TokenUsage,
};
pub use reasoning::{AgentConfig, AgentLoop, AgentResponse, IntermediateStep};
pub use telemetry::{DispatchMode, Telemetry};
pub use tool::{
    parse_arguments, FunctionTool, ParameterSchema, Tool, ToolArguments, ToolCall, ToolRegistry,
    ToolResult, ToolSchema,
};

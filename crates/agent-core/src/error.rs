//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
///
/// Errors attributable to a single tool call never leave the invoker as
/// `Err`; they are folded into a failed [`ToolResult`](crate::tool::ToolResult).
/// The variants below still name them so tools and providers can report
/// precise causes.
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Tool not found in registry
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments could not be decoded into a key-value mapping
    #[error("Tool argument error: {0}")]
    ToolArguments(String),

    /// Tool validation failed
    #[error("Tool validation error: {0}")]
    ToolValidation(String),

    /// Tool execution failed
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Failure outside the normal invocation wrapper (panic, cancelled task)
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// Chain or orchestrator failure (missing registration, bad step input)
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// Conversation memory failure
    #[error("Memory error: {0}")]
    Memory(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Check if error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProviderUnavailable(_) | Self::Memory(_) | Self::Io(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(msg) => format!("The AI service encountered an error: {msg}"),
            Self::ProviderUnavailable(_) => {
                "The AI service is currently unavailable. Please try again.".into()
            }
            Self::ToolNotFound(name) => format!("The tool '{name}' is not available."),
            Self::ToolArguments(msg) | Self::ToolValidation(msg) => {
                format!("Invalid tool input: {msg}")
            }
            Self::ToolExecution(msg) => format!("Tool error: {msg}"),
            Self::Memory(_) => "Conversation history is temporarily unavailable.".into(),
            Self::Config(msg) => format!("The agent is misconfigured: {msg}"),
            Self::Workflow(msg) => format!("The workflow could not run: {msg}"),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(AgentError::ProviderUnavailable("down".into()).is_retryable());
        assert!(!AgentError::ToolNotFound("x".into()).is_retryable());
    }

    #[test]
    fn anyhow_conversion_keeps_message() {
        let err: AgentError = anyhow::anyhow!("boom").into();
        assert_eq!(err.to_string(), "boom");
    }
}

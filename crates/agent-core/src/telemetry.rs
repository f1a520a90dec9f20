//! Span instrumentation for agent runs
//!
//! Components call into [`Telemetry`] at their boundaries instead of
//! wrapping themselves. When tracing is disabled every span is
//! [`Span::none`], so instrumented code runs unchanged.

use std::fmt::Display;

use tracing::field::Empty;
use tracing::Span;

use crate::tool::ToolCall;

/// How a batch of tool calls is executed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchMode {
    Sequential,
    Concurrent { limit: usize },
}

impl DispatchMode {
    /// Pick the mode for a batch: concurrency only pays off for more than one
    /// call and a cap above one.
    pub const fn for_batch(batch_size: usize, max_concurrency: usize) -> Self {
        if max_concurrency > 1 && batch_size > 1 {
            Self::Concurrent {
                limit: max_concurrency,
            }
        } else {
            Self::Sequential
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Concurrent { .. } => "concurrent",
        }
    }
}

/// Span factory for one agent instance
#[derive(Clone, Debug)]
pub struct Telemetry {
    agent_name: String,
    enabled: bool,
}

impl Telemetry {
    pub fn new(agent_name: impl Into<String>, enabled: bool) -> Self {
        Self {
            agent_name: agent_name.into(),
            enabled,
        }
    }

    pub fn disabled() -> Self {
        Self::new("agent", false)
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Outermost span around `Agent::run`
    pub fn run_span(&self, conversation_id: &str, input: &str) -> Span {
        if !self.enabled {
            return Span::none();
        }
        tracing::info_span!(
            "agent.run",
            agent = %self.agent_name,
            conversation_id = %conversation_id,
            input.value = %input,
            output.value = Empty,
            otel.status_code = Empty,
            error.message = Empty,
        )
    }

    pub fn iteration_span(&self, conversation_id: &str, iteration: usize) -> Span {
        if !self.enabled {
            return Span::none();
        }
        tracing::info_span!(
            "agent.loop_iteration",
            agent = %self.agent_name,
            conversation_id = %conversation_id,
            iteration,
            tool_calls = Empty,
            otel.status_code = Empty,
            error.message = Empty,
        )
    }

    pub fn llm_span(&self, model: &str, message_count: usize) -> Span {
        if !self.enabled {
            return Span::none();
        }
        tracing::info_span!(
            "agent.llm_call",
            agent = %self.agent_name,
            llm.model_name = %model,
            message_count,
            otel.status_code = Empty,
            error.message = Empty,
        )
    }

    pub fn dispatch_span(&self, mode: DispatchMode, batch_size: usize) -> Span {
        if !self.enabled {
            return Span::none();
        }
        tracing::info_span!(
            "agent.process_tool_calls",
            agent = %self.agent_name,
            mode = mode.as_str(),
            batch_size,
            failed = Empty,
            otel.status_code = Empty,
        )
    }

    pub fn tool_span(&self, call: &ToolCall) -> Span {
        if !self.enabled {
            return Span::none();
        }
        tracing::info_span!(
            "agent.tool_call",
            agent = %self.agent_name,
            tool.name = %call.name,
            tool.call_id = %call.id,
            tool.arguments = %call.arguments,
            otel.status_code = Empty,
            error.message = Empty,
        )
    }
}

/// Mark a span successful
pub fn record_ok(span: &Span) {
    span.record("otel.status_code", "OK");
}

/// Mark a span failed with a message
pub fn record_error(span: &Span, error: &dyn Display) {
    span.record("otel.status_code", "ERROR");
    span.record("error.message", tracing::field::display(error));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_telemetry_yields_empty_spans() {
        let telemetry = Telemetry::disabled();
        let call = ToolCall::new("1", "multiply", "{}");

        assert!(telemetry.run_span("conv", "hi").is_none());
        assert!(telemetry.iteration_span("conv", 1).is_none());
        assert!(telemetry.llm_span("llama3.2", 2).is_none());
        assert!(telemetry.dispatch_span(DispatchMode::Sequential, 1).is_none());
        assert!(telemetry.tool_span(&call).is_none());

        // Recording on a disabled span is a no-op
        record_error(&telemetry.run_span("conv", "hi"), &"boom");
    }

    #[test]
    fn dispatch_mode_selection() {
        assert_eq!(DispatchMode::for_batch(3, 1), DispatchMode::Sequential);
        assert_eq!(DispatchMode::for_batch(1, 4), DispatchMode::Sequential);
        assert_eq!(
            DispatchMode::for_batch(3, 2),
            DispatchMode::Concurrent { limit: 2 }
        );
    }
}

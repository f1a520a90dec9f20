//! Test doubles shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use crate::error::{AgentError, Result};
use crate::message::Message;
use crate::provider::{Completion, GenerationOptions, LlmProvider};
use crate::tool::{
    parse_arguments, FunctionTool, ParameterSchema, Tool, ToolArguments, ToolCall, ToolRegistry,
    ToolSchema,
};

fn schema(name: &str, parameters: Vec<ParameterSchema>) -> ToolSchema {
    ToolSchema {
        name: name.into(),
        description: format!("Test tool {name}"),
        parameters,
        category: Some("test".into()),
        has_side_effects: false,
    }
}

/// Registry holding a synchronous `multiply(a, b)` tool
pub fn multiply_registry() -> ToolRegistry {
    #[derive(Deserialize)]
    struct Operands {
        a: i64,
        b: i64,
    }

    let multiply = FunctionTool::new(
        schema(
            "multiply",
            vec![
                ParameterSchema::required("a", "integer", "First factor"),
                ParameterSchema::required("b", "integer", "Second factor"),
            ],
        ),
        |args: ToolArguments| {
            let ops: Operands = parse_arguments(args)?;
            Ok(json!({ "product": ops.a * ops.b }))
        },
    );

    let mut registry = ToolRegistry::new();
    registry.register(multiply);
    registry
}

/// Always returns an execution error
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn schema(&self) -> ToolSchema {
        schema("explode", Vec::new())
    }

    async fn execute(&self, _arguments: ToolArguments) -> Result<serde_json::Value> {
        Err(AgentError::ToolExecution("kaboom".into()))
    }
}

/// Panics inside the tool body
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn schema(&self) -> ToolSchema {
        schema("panic", Vec::new())
    }

    async fn execute(&self, _arguments: ToolArguments) -> Result<serde_json::Value> {
        panic!("tool panic");
    }
}

#[derive(Default)]
struct SleepState {
    in_flight: usize,
    max_in_flight: usize,
    intervals: Vec<(Instant, Instant)>,
}

/// Sleeps for `delay_ms` and records when it ran and how many sleeps
/// overlapped.
#[derive(Clone, Default)]
pub struct SleepTool {
    state: Arc<Mutex<SleepState>>,
}

impl SleepTool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.lock().unwrap().max_in_flight
    }

    pub fn intervals(&self) -> Vec<(Instant, Instant)> {
        self.state.lock().unwrap().intervals.clone()
    }
}

#[async_trait]
impl Tool for SleepTool {
    fn schema(&self) -> ToolSchema {
        schema(
            "sleep",
            vec![ParameterSchema::optional("delay_ms", "integer", "Sleep time")],
        )
    }

    async fn execute(&self, arguments: ToolArguments) -> Result<serde_json::Value> {
        let delay = arguments
            .get("delay_ms")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(10);

        let started = Instant::now();
        {
            let mut state = self.state.lock().unwrap();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
        }

        tokio::time::sleep(Duration::from_millis(delay)).await;

        let mut state = self.state.lock().unwrap();
        state.in_flight -= 1;
        state.intervals.push((started, Instant::now()));
        Ok(json!({ "slept_ms": delay }))
    }
}

/// Replays a fixed script of completions and records what it was sent
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<Completion>>>,
    repeat: Option<Completion>,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<Completion>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Default::default()
        }
    }

    /// Answer every call with the same completion
    pub fn always(completion: Completion) -> Self {
        Self {
            repeat: Some(completion),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// Messages passed on the n-th call
    pub fn messages_seen(&self, call: usize) -> Vec<Message> {
        self.seen.lock().unwrap()[call].clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[Message],
        _tools: &[ToolSchema],
        _options: &GenerationOptions,
    ) -> Result<Completion> {
        self.seen.lock().unwrap().push(messages.to_vec());

        if let Some(completion) = &self.repeat {
            return Ok(completion.clone());
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AgentError::Provider("script exhausted".into())))
    }
}

/// A single `multiply` request with the given operands
pub fn multiply_call(id: &str, a: i64, b: i64) -> ToolCall {
    ToolCall::new(id, "multiply", json!({ "a": a, "b": b }).to_string())
}

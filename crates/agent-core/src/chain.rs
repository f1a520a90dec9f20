//! Workflow Chains
//!
//! A [`Chain`] turns one input into one output by driving tools and agents
//! registered on an [`Orchestrator`]. [`SequentialChain`] runs a fixed list
//! of steps through a shared [`WorkflowContext`]; [`AgentChain`] hands the
//! whole input to a single agent.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::orchestrator::{Orchestrator, WorkflowOptions};
use crate::reasoning::AgentResponse;

/// What a step runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", rename_all = "snake_case")]
pub enum StepKind {
    Tool,
    Agent,
}

impl TryFrom<String> for StepKind {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.as_str() {
            "tool" => Ok(Self::Tool),
            "agent" => Ok(Self::Agent),
            other => Err(format!("Unknown step type '{other}'")),
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tool => f.write_str("tool"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

/// One step of a [`SequentialChain`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainStep {
    #[serde(rename = "type")]
    pub kind: StepKind,

    /// Registered tool or agent name
    pub key: String,

    /// Context key to read; defaults to the previous step's output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_key: Option<String>,

    /// Context key to write; the output is always also stored as the
    /// last step output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_key: Option<String>,
}

impl ChainStep {
    pub fn tool(key: impl Into<String>) -> Self {
        Self::new(StepKind::Tool, key)
    }

    pub fn agent(key: impl Into<String>) -> Self {
        Self::new(StepKind::Agent, key)
    }

    fn new(kind: StepKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            input_key: None,
            output_key: None,
        }
    }

    pub fn input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = Some(key.into());
        self
    }

    pub fn output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }
}

/// Named values shared by the steps of one workflow run
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkflowContext {
    values: HashMap<String, Value>,
}

impl WorkflowContext {
    /// Key holding the input the chain was started with
    pub const INITIAL_INPUT: &'static str = "_initial_chain_input";

    /// Key holding the most recent step output
    pub const LAST_STEP_OUTPUT: &'static str = "_last_step_output";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Sorted key list, for error messages
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.values.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn require(&self, key: &str, location: impl FnOnce() -> String) -> Result<Value> {
        self.values.get(key).cloned().ok_or_else(|| {
            AgentError::Workflow(format!(
                "Input key '{key}' not found in workflow context for {}. Available keys: {:?}",
                location(),
                self.keys()
            ))
        })
    }
}

/// Result of a chain execution
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChainOutput {
    /// Value of the chain's final output key
    pub output: Value,

    /// Responses of every agent step, in step order
    pub responses: Vec<AgentResponse>,
}

impl ChainOutput {
    /// Response of the last agent step, if any ran
    pub fn last_response(&self) -> Option<&AgentResponse> {
        self.responses.last()
    }
}

/// A unit of work the orchestrator can run by name
#[async_trait]
pub trait Chain: Send + Sync {
    /// Registry key
    fn key(&self) -> &str;

    /// Run the chain on `input`, reading and writing `context`
    async fn execute(
        &self,
        orchestrator: &Orchestrator,
        input: Value,
        options: &WorkflowOptions,
        context: &mut WorkflowContext,
    ) -> Result<ChainOutput>;
}

/// Runs its steps in order, each reading from and writing to the context
#[derive(Clone, Debug)]
pub struct SequentialChain {
    key: String,
    steps: Vec<ChainStep>,
    final_output_key: String,
}

impl SequentialChain {
    pub fn new(key: impl Into<String>, steps: Vec<ChainStep>) -> Result<Self> {
        let key = key.into();
        if steps.is_empty() {
            return Err(AgentError::Config(format!(
                "Chain '{key}' must have at least one step"
            )));
        }
        Ok(Self {
            key,
            steps,
            final_output_key: WorkflowContext::LAST_STEP_OUTPUT.into(),
        })
    }

    /// Build from a JSON step list such as
    /// `[{"type": "tool", "key": "multiply", "output_key": "product"}]`
    pub fn from_json(key: impl Into<String>, steps: Value) -> Result<Self> {
        let key = key.into();
        let steps: Vec<ChainStep> = serde_json::from_value(steps)
            .map_err(|e| AgentError::Config(format!("Invalid steps for chain '{key}': {e}")))?;
        Self::new(key, steps)
    }

    /// Context key returned as the chain output
    pub fn final_output_key(mut self, key: impl Into<String>) -> Self {
        self.final_output_key = key.into();
        self
    }

    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    fn step_input(
        &self,
        index: usize,
        step: &ChainStep,
        initial: &Value,
        context: &WorkflowContext,
    ) -> Result<Value> {
        let location = || {
            format!(
                "step {} ({}, {}) in chain '{}'",
                index + 1,
                step.kind,
                step.key,
                self.key
            )
        };
        match &step.input_key {
            Some(key) => context.require(key, location),
            None if index == 0 => Ok(initial.clone()),
            None => context.require(WorkflowContext::LAST_STEP_OUTPUT, location),
        }
    }

    async fn run_tool(
        &self,
        orchestrator: &Orchestrator,
        step: &ChainStep,
        input: Value,
    ) -> Result<Value> {
        let arguments = match input {
            Value::Object(arguments) => arguments,
            other => {
                return Err(AgentError::Workflow(format!(
                    "Tool step '{}' in chain '{}' expects an object input, got {other}",
                    step.key, self.key
                )));
            }
        };
        let tool = orchestrator.get_tool(&step.key)?;
        tool.validate(&arguments)?;
        tool.execute(arguments).await
    }
}

#[async_trait]
impl Chain for SequentialChain {
    fn key(&self) -> &str {
        &self.key
    }

    async fn execute(
        &self,
        orchestrator: &Orchestrator,
        input: Value,
        options: &WorkflowOptions,
        context: &mut WorkflowContext,
    ) -> Result<ChainOutput> {
        context.insert(WorkflowContext::INITIAL_INPUT, input.clone());
        context.insert(WorkflowContext::LAST_STEP_OUTPUT, input.clone());

        let mut responses = Vec::new();

        for (index, step) in self.steps.iter().enumerate() {
            let step_input = self.step_input(index, step, &input, context)?;
            tracing::debug!(
                chain = %self.key,
                step = index + 1,
                kind = %step.kind,
                key = %step.key,
                "Running chain step"
            );

            let output = match step.kind {
                StepKind::Tool => self.run_tool(orchestrator, step, step_input).await?,
                StepKind::Agent => {
                    let response = run_agent(orchestrator, &step.key, step_input, options).await?;
                    let output = Value::String(response.output.clone());
                    responses.push(response);
                    output
                }
            };

            if let Some(key) = &step.output_key {
                context.insert(key.clone(), output.clone());
            }
            context.insert(WorkflowContext::LAST_STEP_OUTPUT, output);
        }

        let output = context.get(&self.final_output_key).cloned().ok_or_else(|| {
            AgentError::Workflow(format!(
                "Final output key '{}' not found after chain '{}'",
                self.final_output_key, self.key
            ))
        })?;

        Ok(ChainOutput { output, responses })
    }
}

/// Delegates the whole input to one registered agent
#[derive(Clone, Debug)]
pub struct AgentChain {
    key: String,
    agent_key: String,
}

impl AgentChain {
    /// Fails if `agent_key` is not registered on `orchestrator`
    pub fn new(
        key: impl Into<String>,
        agent_key: impl Into<String>,
        orchestrator: &Orchestrator,
    ) -> Result<Self> {
        let agent_key = agent_key.into();
        orchestrator.get_agent(&agent_key)?;
        Ok(Self {
            key: key.into(),
            agent_key,
        })
    }

    pub fn agent_key(&self) -> &str {
        &self.agent_key
    }
}

#[async_trait]
impl Chain for AgentChain {
    fn key(&self) -> &str {
        &self.key
    }

    async fn execute(
        &self,
        orchestrator: &Orchestrator,
        input: Value,
        options: &WorkflowOptions,
        context: &mut WorkflowContext,
    ) -> Result<ChainOutput> {
        context.insert(WorkflowContext::INITIAL_INPUT, input.clone());

        let response = run_agent(orchestrator, &self.agent_key, input, options).await?;
        let output = Value::String(response.output.clone());
        context.insert(WorkflowContext::LAST_STEP_OUTPUT, output.clone());

        Ok(ChainOutput {
            output,
            responses: vec![response],
        })
    }
}

async fn run_agent(
    orchestrator: &Orchestrator,
    agent_key: &str,
    input: Value,
    options: &WorkflowOptions,
) -> Result<AgentResponse> {
    let message = match input {
        Value::String(text) => text,
        other => {
            tracing::warn!(agent = agent_key, "Agent input is not a string, sending its JSON text");
            other.to_string()
        }
    };

    let mut agent = orchestrator.get_agent(agent_key)?.build(options)?;
    Ok(agent.run(&message, options.conversation_id.as_deref()).await)
}

//! Server Configuration
//!
//! Read from the environment (and a `.env` file, if present). Values that do
//! not parse fall back to their defaults with a warning.

use std::str::FromStr;

use agent_core::AgentConfig;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind_addr: String,

    /// Template for the per-request agents
    pub agent: AgentConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            agent: AgentConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut agent = defaults.agent;

        if let Some(model) = lookup("AGENT_MODEL").filter(|m| !m.trim().is_empty()) {
            agent.generation.model = model;
        }
        agent.max_iterations = parse_or(&lookup, "AGENT_MAX_ITERATIONS", agent.max_iterations);
        if agent.max_iterations == 0 {
            tracing::warn!("AGENT_MAX_ITERATIONS must be at least 1, using 1");
            agent.max_iterations = 1;
        }
        agent.max_tool_concurrency = parse_or(
            &lookup,
            "AGENT_MAX_TOOL_CONCURRENCY",
            agent.max_tool_concurrency,
        );
        agent.enable_tracing = parse_or(&lookup, "AGENT_ENABLE_TRACING", agent.enable_tracing);
        agent.system_prompt = lookup("AGENT_SYSTEM_PROMPT").or(agent.system_prompt);

        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            agent,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    let Some(raw) = lookup(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, ?default, "Invalid value, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let loaded = config(&[]);
        assert_eq!(loaded.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(loaded.agent.max_iterations, 3);
        assert_eq!(loaded.agent.max_tool_concurrency, 1);
        assert!(!loaded.agent.enable_tracing);
    }

    #[test]
    fn reads_overrides() {
        let loaded = config(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("AGENT_MODEL", "qwen2.5"),
            ("AGENT_MAX_ITERATIONS", "5"),
            ("AGENT_MAX_TOOL_CONCURRENCY", "4"),
            ("AGENT_ENABLE_TRACING", "true"),
            ("AGENT_SYSTEM_PROMPT", "Be brief."),
        ]);
        assert_eq!(loaded.bind_addr, "127.0.0.1:8080");
        assert_eq!(loaded.agent.generation.model, "qwen2.5");
        assert_eq!(loaded.agent.max_iterations, 5);
        assert_eq!(loaded.agent.max_tool_concurrency, 4);
        assert!(loaded.agent.enable_tracing);
        assert_eq!(loaded.agent.system_prompt.as_deref(), Some("Be brief."));
    }

    #[test]
    fn invalid_values_fall_back() {
        let fallback = config(&[
            ("AGENT_MAX_ITERATIONS", "lots"),
            ("AGENT_MAX_TOOL_CONCURRENCY", "-1"),
            ("AGENT_ENABLE_TRACING", "yes please"),
        ]);
        assert_eq!(fallback.agent.max_iterations, 3);
        assert_eq!(fallback.agent.max_tool_concurrency, 1);
        assert!(!fallback.agent.enable_tracing);

        assert_eq!(config(&[("AGENT_MAX_ITERATIONS", "0")]).agent.max_iterations, 1);
    }
}

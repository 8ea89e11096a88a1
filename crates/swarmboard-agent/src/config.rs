//! Per-worker tuning (§4.8, §6.5's `agents[*]` keys).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub agent_id: String,
    pub role: String,
    pub reputation: i64,
    #[serde(default)]
    pub restricted_to_roles: Option<Vec<String>>,
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    #[serde(default = "default_max_idle_cycles")]
    pub max_idle_cycles: u32,
    #[serde(default = "default_idle_backoff_min_ms")]
    pub idle_backoff_min_ms: u64,
    #[serde(default = "default_idle_backoff_max_ms")]
    pub idle_backoff_max_ms: u64,
    #[serde(default = "default_prompt_budget_chars")]
    pub prompt_budget_chars: usize,
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
}

fn default_max_tool_iterations() -> u32 {
    20
}

fn default_max_idle_cycles() -> u32 {
    30
}

fn default_idle_backoff_min_ms() -> u64 {
    1_000
}

fn default_idle_backoff_max_ms() -> u64 {
    5_000
}

fn default_prompt_budget_chars() -> usize {
    32_000
}

fn default_probe_interval_secs() -> u64 {
    60
}

impl WorkerConfig {
    pub fn new(agent_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            role: role.into(),
            reputation: 0,
            restricted_to_roles: None,
            max_tool_iterations: default_max_tool_iterations(),
            max_idle_cycles: default_max_idle_cycles(),
            idle_backoff_min_ms: default_idle_backoff_min_ms(),
            idle_backoff_max_ms: default_idle_backoff_max_ms(),
            prompt_budget_chars: default_prompt_budget_chars(),
            probe_interval_secs: default_probe_interval_secs(),
        }
    }
}

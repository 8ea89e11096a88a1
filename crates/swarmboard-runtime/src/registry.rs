//! Agent definitions and the runtime's per-agent bookkeeping (§4.5).

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// A registered agent: its id, the role(s) it services, and whether it must
/// stay resident continuously.
#[derive(Debug, Clone)]
pub struct AgentDefinition {
    pub agent_id: String,
    pub roles: Vec<String>,
    pub always_on: bool,
}

impl AgentDefinition {
    pub fn new(agent_id: impl Into<String>, roles: Vec<String>, always_on: bool) -> Self {
        Self {
            agent_id: agent_id.into(),
            roles,
            always_on,
        }
    }

    pub fn services_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Runtime-wide configuration: which agent ids must always be alive, and
/// the idle grace period before an on-demand agent is shut down.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub always_on: HashSet<String>,
    pub idle_shutdown_seconds: i64,
    pub shutdown_grace_seconds: i64,
    pub kill_after_seconds: i64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            always_on: HashSet::new(),
            idle_shutdown_seconds: 300,
            shutdown_grace_seconds: 5,
            kill_after_seconds: 3,
        }
    }
}

/// Bookkeeping the runtime keeps per registered agent, independent of
/// whether it is currently running.
pub struct AgentState {
    pub definition: AgentDefinition,
    pub last_activity_ts: DateTime<Utc>,
    pub handle: Option<std::sync::Arc<dyn crate::handle::WorkerHandle>>,
}

impl AgentState {
    pub fn new(definition: AgentDefinition) -> Self {
        Self {
            definition,
            last_activity_ts: Utc::now(),
            handle: None,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.handle.is_some()
    }
}

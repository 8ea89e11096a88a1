//! Lazy Runtime (C5): an on-demand worker supervisor. Agents expensive to
//! keep resident only run when the board shows matching pending work, or
//! when they are configured `always_on`.

use crate::handle::WorkerFactory;
use crate::registry::{AgentDefinition, AgentState, RuntimeConfig};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use swarmboard_board::Board;
use swarmboard_core::SwarmResult;
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{info, warn};

/// Supervises agent workers: launches them on demand, stops them after an
/// idle grace period, and never auto-restarts a crashed worker (recovery
/// is delegated to the Task Board's stale-claim sweep, per §4.5).
pub struct LazyRuntime {
    board: Board,
    config: RuntimeConfig,
    factory: Arc<dyn WorkerFactory>,
    agents: RwLock<HashMap<String, AgentState>>,
}

impl LazyRuntime {
    pub fn new(board: Board, config: RuntimeConfig, factory: Arc<dyn WorkerFactory>) -> Self {
        Self {
            board,
            config,
            factory,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Registers an agent without launching it, unless it is `always_on`,
    /// in which case it is launched immediately.
    pub async fn register(&self, definition: AgentDefinition) -> SwarmResult<()> {
        let always_on = definition.always_on || self.config.always_on.contains(&definition.agent_id);
        let agent_id = definition.agent_id.clone();
        let mut agents = self.agents.write().await;
        agents.insert(agent_id.clone(), AgentState::new(definition));
        drop(agents);
        if always_on {
            self.ensure_running(&agent_id).await?;
        }
        Ok(())
    }

    /// Idempotent: launches the agent if not alive, otherwise refreshes its
    /// activity timestamp.
    pub async fn ensure_running(&self, agent_id: &str) -> SwarmResult<()> {
        let mut agents = self.agents.write().await;
        let Some(state) = agents.get_mut(agent_id) else {
            return Err(swarmboard_core::SwarmError::Runtime(format!(
                "agent {agent_id} is not registered"
            )));
        };
        state.last_activity_ts = Utc::now();
        if state.is_alive() {
            return Ok(());
        }
        info!(agent_id, "launching worker");
        state.handle = Some(self.factory.launch(agent_id));
        Ok(())
    }

    /// One supervisor tick (~2 s cadence, §4.5): scans pending board tasks
    /// and launches any registered-but-dormant agent whose role matches.
    pub async fn tick(&self) -> SwarmResult<()> {
        let tasks = self.board.snapshot().await?;
        let pending_roles: Vec<String> = tasks
            .iter()
            .filter(|t| t.status == swarmboard_core::TaskStatus::Pending)
            .filter_map(|t| t.required_role.clone())
            .collect();

        let candidate_ids: Vec<String> = {
            let agents = self.agents.read().await;
            agents
                .values()
                .filter(|s| {
                    !s.is_alive()
                        && pending_roles
                            .iter()
                            .any(|role| s.definition.services_role(role))
                })
                .map(|s| s.definition.agent_id.clone())
                .collect()
        };
        for agent_id in candidate_ids {
            self.ensure_running(&agent_id).await?;
        }
        Ok(())
    }

    /// Roughly every 60 s (§4.5): stops non-`always_on` agents idle past
    /// `idle_shutdown_seconds` with no active board claim.
    pub async fn evaluate_idle(&self) -> SwarmResult<()> {
        let tasks = self.board.snapshot().await?;
        let now = Utc::now();

        let idle_candidates: Vec<String> = {
            let agents = self.agents.read().await;
            agents
                .values()
                .filter(|s| {
                    s.is_alive()
                        && !s.definition.always_on
                        && (now - s.last_activity_ts).num_seconds() > self.config.idle_shutdown_seconds
                        && !tasks
                            .iter()
                            .any(|t| t.agent_id.as_deref() == Some(s.definition.agent_id.as_str()))
                })
                .map(|s| s.definition.agent_id.clone())
                .collect()
        };

        for agent_id in idle_candidates {
            self.shutdown(&agent_id).await?;
        }
        Ok(())
    }

    /// Graceful-shutdown-then-kill sequencing: request shutdown, wait up to
    /// `shutdown_grace_seconds`, then `kill_after_seconds` later force-kill
    /// an uncooperative worker.
    pub async fn shutdown(&self, agent_id: &str) -> SwarmResult<()> {
        let handle = {
            let agents = self.agents.read().await;
            agents.get(agent_id).and_then(|s| s.handle.clone())
        };
        let Some(handle) = handle else {
            return Ok(());
        };

        handle.request_shutdown().await?;
        let grace = Duration::from_secs(self.config.shutdown_grace_seconds.max(0) as u64);
        if tokio::time::timeout(grace, handle.join()).await.is_err() {
            warn!(agent_id, "worker did not shut down gracefully, signalling termination");
            let kill_wait = Duration::from_secs(self.config.kill_after_seconds.max(0) as u64);
            if tokio::time::timeout(kill_wait, handle.join()).await.is_err() {
                handle.force_kill().await;
            }
        }

        let mut agents = self.agents.write().await;
        if let Some(state) = agents.get_mut(agent_id) {
            state.handle = None;
        }
        Ok(())
    }

    pub async fn is_alive(&self, agent_id: &str) -> bool {
        self.agents
            .read()
            .await
            .get(agent_id)
            .map(AgentState::is_alive)
            .unwrap_or(false)
    }
}

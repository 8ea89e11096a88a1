//! The task board's in-memory document: the state machine of §4.1 applied
//! to a plain `HashMap<String, Task>`. All mutation methods are pure
//! (no I/O); `swarmboard_board::store::Board` is the async, file-backed,
//! locked wrapper around this.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use swarmboard_core::{CritiqueSpec, SwarmError, SwarmResult, Task, TaskStatus, Verdict};

/// A claimant's identity and standing, evaluated against a task's claim
/// gates (role routing, reputation, restricted-claim set).
#[derive(Debug, Clone)]
pub struct Claimant<'a> {
    pub agent_id: &'a str,
    pub role: &'a str,
    pub reputation: i64,
    /// If `Some`, the agent may only claim tasks whose `required_role`
    /// matches one of the given roles — the "restricted agent" case (e.g.
    /// the reviewer identity may only claim review/critique work).
    pub restricted_to_roles: Option<&'a [&'a str]>,
}

const STRICT_ROLES: &[&str] = &["planner", "plan", "review", "critique"];

fn role_matches(required: Option<&str>, claimant: &Claimant<'_>) -> bool {
    let Some(required) = required else {
        return claimant.restricted_to_roles.is_none();
    };
    if let Some(allowed) = claimant.restricted_to_roles {
        return allowed.contains(&required);
    }
    if STRICT_ROLES.contains(&required) {
        return claimant.role == required;
    }
    true
}

/// Stale-claim thresholds, in seconds, per §4.1.
pub const CLAIMED_STALE_SECONDS: i64 = 180;
pub const REVIEW_STALE_SECONDS: i64 = 300;

/// The whole board: a single JSON document of tasks, keyed by id.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BoardDocument {
    pub tasks: HashMap<String, Task>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

impl BoardDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new task, rejecting if its `blocked_by` set would
    /// introduce a cycle in the blocker DAG (§3.1 invariant).
    pub fn create(&mut self, task: Task) -> SwarmResult<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(SwarmError::Board(format!("task {} already exists", task.id)));
        }
        let id = task.id.clone();
        self.tasks.insert(id.clone(), task);
        if self.has_cycle() {
            self.tasks.remove(&id);
            return Err(SwarmError::Board(format!(
                "task {id} would introduce a cycle in blocked_by"
            )));
        }
        Ok(())
    }

    /// DFS-based 3-color cycle detection over the `blocked_by` graph.
    fn has_cycle(&self) -> bool {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        for id in self.tasks.keys() {
            if !marks.contains_key(id.as_str()) && self.dfs_cycle(id, &mut marks) {
                return true;
            }
        }
        false
    }

    fn dfs_cycle<'a>(&'a self, id: &'a str, marks: &mut HashMap<&'a str, Mark>) -> bool {
        marks.insert(id, Mark::InProgress);
        if let Some(task) = self.tasks.get(id) {
            for blocker in &task.blocked_by {
                match marks.get(blocker.as_str()) {
                    Some(Mark::InProgress) => return true,
                    Some(Mark::Done) => continue,
                    None => {
                        if self.dfs_cycle(blocker, marks) {
                            return true;
                        }
                    }
                }
            }
        }
        marks.insert(id, Mark::Done);
        false
    }

    fn completed_ids(&self) -> HashSet<String> {
        self.tasks
            .iter()
            .filter(|(_, t)| t.status == TaskStatus::Completed)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn get_mut(&mut self, id: &str) -> SwarmResult<&mut Task> {
        self.tasks
            .get_mut(id)
            .ok_or_else(|| SwarmError::Board(format!("task {id} not found")))
    }

    /// Selects the next claimable task for `claimant`, in deterministic
    /// (insertion/id-sorted) order, per §4.1's claim-selection algorithm.
    /// Does not mutate; pair with [`BoardDocument::claim`].
    pub fn next_claimable(&self, claimant: &Claimant<'_>) -> Option<&Task> {
        let completed = self.completed_ids();
        let mut pending: Vec<&Task> = self
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        pending.into_iter().find(|t| {
            role_matches(t.required_role.as_deref(), claimant)
                && t.blocked_by.iter().all(|b| completed.contains(b))
                && claimant.reputation >= t.min_reputation
        })
    }

    pub fn claim(&mut self, id: &str, claimant: &Claimant<'_>) -> SwarmResult<()> {
        let completed = self.completed_ids();
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Pending {
            return Err(SwarmError::Board(format!(
                "task {id} is not pending (status={:?})",
                task.status
            )));
        }
        if !task.blocked_by.iter().all(|b| completed.contains(b)) {
            return Err(SwarmError::Board(format!("task {id} has incomplete blockers")));
        }
        if !role_matches(task.required_role.as_deref(), claimant) {
            return Err(SwarmError::Board(format!(
                "agent {} is not permitted to claim task {id}",
                claimant.agent_id
            )));
        }
        if claimant.reputation < task.min_reputation {
            return Err(SwarmError::Board(format!(
                "agent {} reputation {} below minimum {}",
                claimant.agent_id, claimant.reputation, task.min_reputation
            )));
        }
        task.status = TaskStatus::Claimed;
        task.agent_id = Some(claimant.agent_id.to_string());
        task.claimed_at = Some(Utc::now());
        Ok(())
    }

    /// `claimed -> review`, or straight to `completed` if `complexity =
    /// simple` (auto-complete, §4.1).
    pub fn submit_for_review(&mut self, id: &str, result: String) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Claimed {
            return Err(SwarmError::Board(format!("task {id} is not claimed")));
        }
        task.result = Some(result);
        if task.complexity == swarmboard_core::Complexity::Simple {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
        } else if task.critique_round >= 1 {
            // rework cap: second revision force-completes regardless of
            // further critique (§3.1 invariant, §4.1 transition table)
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
        } else {
            task.status = TaskStatus::Review;
        }
        Ok(())
    }

    /// `claimed -> completed` directly; only valid for `simple` tasks or
    /// after forced synthesis has already produced a result.
    pub fn complete(&mut self, id: &str, result: Option<String>) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Claimed && task.status != TaskStatus::Synthesizing {
            return Err(SwarmError::Board(format!(
                "task {id} cannot complete from status {:?}",
                task.status
            )));
        }
        if let Some(r) = result {
            task.result = Some(r);
        }
        task.status = TaskStatus::Completed;
        task.completed_at = Some(Utc::now());
        Ok(())
    }

    /// `claimed -> synthesizing`, entered once all of a planner task's
    /// sub-tasks have completed and the orchestrator is building the
    /// close-out result (§4.7).
    pub fn begin_synthesis(&mut self, id: &str) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Claimed {
            return Err(SwarmError::Board(format!(
                "task {id} cannot enter synthesis from status {:?}",
                task.status
            )));
        }
        task.status = TaskStatus::Synthesizing;
        Ok(())
    }

    pub fn add_critique(&mut self, id: &str, critique: CritiqueSpec) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Review {
            return Err(SwarmError::Board(format!("task {id} is not under review")));
        }
        let verdict = critique.verdict;
        task.critique = Some(critique);
        match verdict {
            Verdict::Lgtm => {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(Utc::now());
            }
            Verdict::NeedsWork => {
                task.status = TaskStatus::Critique;
                task.critique_round += 1;
            }
        }
        Ok(())
    }

    /// Only the original executor (the `agent_id` recorded at the original
    /// `claim`) may claim a task out of `critique` — the strict-ownership
    /// resolution of spec.md's open question.
    pub fn claim_critique(&mut self, id: &str, agent_id: &str) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Critique {
            return Err(SwarmError::Board(format!("task {id} is not in critique")));
        }
        if task.agent_id.as_deref() != Some(agent_id) {
            return Err(SwarmError::Board(format!(
                "only the original executor may claim task {id} out of critique"
            )));
        }
        task.status = TaskStatus::Claimed;
        task.claimed_at = Some(Utc::now());
        Ok(())
    }

    pub fn cancel(&mut self, id: &str) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status.is_terminal() {
            return Err(SwarmError::Board(format!("task {id} is already terminal")));
        }
        task.status = TaskStatus::Cancelled;
        Ok(())
    }

    /// Cancels `id` and every non-terminal descendant transitively
    /// (`cancel(task_id)` per §4.7).
    pub fn cancel_with_descendants(&mut self, id: &str) -> SwarmResult<Vec<String>> {
        self.cancel(id)?;
        let mut cancelled = vec![id.to_string()];
        let mut frontier = vec![id.to_string()];
        while let Some(parent) = frontier.pop() {
            let children: Vec<String> = self
                .tasks
                .values()
                .filter(|t| t.parent_id.as_deref() == Some(parent.as_str()) && !t.status.is_terminal())
                .map(|t| t.id.clone())
                .collect();
            for child in children {
                if self.cancel(&child).is_ok() {
                    cancelled.push(child.clone());
                    frontier.push(child);
                }
            }
        }
        Ok(cancelled)
    }

    pub fn pause(&mut self, id: &str) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Pending && task.status != TaskStatus::Claimed {
            return Err(SwarmError::Board(format!(
                "task {id} cannot be paused from status {:?}",
                task.status
            )));
        }
        task.status = TaskStatus::Paused;
        Ok(())
    }

    pub fn resume(&mut self, id: &str) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Paused {
            return Err(SwarmError::Board(format!("task {id} is not paused")));
        }
        task.status = TaskStatus::Pending;
        task.agent_id = None;
        Ok(())
    }

    pub fn fail(&mut self, id: &str, reason: &str) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status.is_terminal() {
            return Err(SwarmError::Board(format!("task {id} is already terminal")));
        }
        task.status = TaskStatus::Failed;
        task.evolution_flags.push(format!("failed:{reason}"));
        Ok(())
    }

    pub fn retry(&mut self, id: &str) -> SwarmResult<()> {
        let task = self.get_mut(id)?;
        if task.status != TaskStatus::Failed && task.status != TaskStatus::Cancelled {
            return Err(SwarmError::Board(format!(
                "task {id} can only retry from failed or cancelled (status={:?})",
                task.status
            )));
        }
        task.status = TaskStatus::Pending;
        task.agent_id = None;
        task.claimed_at = None;
        Ok(())
    }

    /// Applies §4.1's stale-recovery rules to every task, returning the ids
    /// that were recovered. Idempotent: a task already past recovery is a
    /// no-op on the next sweep.
    pub fn recover_stale(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut recovered = Vec::new();
        for task in self.tasks.values_mut() {
            match task.status {
                TaskStatus::Claimed => {
                    if let Some(claimed_at) = task.claimed_at {
                        if (now - claimed_at).num_seconds() > CLAIMED_STALE_SECONDS {
                            task.status = TaskStatus::Pending;
                            task.agent_id = None;
                            task.evolution_flags.push("timeout_recovered:claimed".into());
                            recovered.push(task.id.clone());
                        }
                    }
                }
                TaskStatus::Review => {
                    if let Some(claimed_at) = task.claimed_at {
                        if (now - claimed_at).num_seconds() > REVIEW_STALE_SECONDS {
                            task.status = TaskStatus::Completed;
                            task.completed_at = Some(now);
                            task.evolution_flags.push("timeout_recovered:review".into());
                            recovered.push(task.id.clone());
                        }
                    }
                }
                _ => {}
            }
        }
        recovered
    }
}

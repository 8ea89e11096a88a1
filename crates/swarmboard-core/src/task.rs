//! The Task Board's unit of work (§3.1) and its status state machine
//! (§4.1). This module defines the data shape; the state machine's
//! transition logic lives in `swarmboard-board`, which is the sole writer
//! of `status`/`agent_id`/timestamps.

use crate::critique::CritiqueSpec;
use crate::provenance::Source;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Gates whether a task goes through the critique stage at all (`Simple`
/// auto-completes on submission) and informs reviewer effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Normal,
    Complex,
}

/// A task's position in the board's state machine. Transitions are
/// enumerated in full in `swarmboard-board`'s state machine module;
/// `Synthesizing` is a first-class persisted status per the close-out
/// design decision (not merely an orchestrator-internal flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Claimed,
    Review,
    Critique,
    Synthesizing,
    Completed,
    Failed,
    Cancelled,
    Paused,
}

impl TaskStatus {
    /// Terminal statuses never transition further.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// A unit of work tracked by the Task Board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub description: String,
    pub status: TaskStatus,
    pub required_role: Option<String>,
    pub agent_id: Option<String>,
    pub parent_id: Option<String>,
    #[serde(default)]
    pub blocked_by: BTreeSet<String>,
    #[serde(default)]
    pub min_reputation: i64,
    pub complexity: Complexity,
    pub result: Option<String>,
    pub critique: Option<CritiqueSpec>,
    #[serde(default)]
    pub critique_round: u32,
    #[serde(default)]
    pub evolution_flags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub source: Source,
}

impl Task {
    /// Builds a new, unclaimed root task. Use [`Task::child_of`] for
    /// sub-tasks so `source`/`parent_id` inheritance (an invariant of
    /// §3.1) is enforced by construction rather than by caller discipline.
    pub fn new_root(
        id: impl Into<String>,
        description: impl Into<String>,
        required_role: Option<String>,
        complexity: Complexity,
        source: Source,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            required_role,
            agent_id: None,
            parent_id: None,
            blocked_by: BTreeSet::new(),
            min_reputation: 0,
            complexity,
            result: None,
            critique: None,
            critique_round: 0,
            evolution_flags: Vec::new(),
            created_at: Utc::now(),
            claimed_at: None,
            completed_at: None,
            source,
        }
    }

    /// Builds a sub-task inheriting `source` and `parent_id` from `parent`,
    /// per the §3.1 invariant.
    pub fn child_of(
        parent: &Task,
        id: impl Into<String>,
        description: impl Into<String>,
        required_role: Option<String>,
        complexity: Complexity,
        blocked_by: BTreeSet<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            required_role,
            agent_id: None,
            parent_id: Some(parent.id.clone()),
            blocked_by,
            min_reputation: 0,
            complexity,
            result: None,
            critique: None,
            critique_round: 0,
            evolution_flags: Vec::new(),
            created_at: Utc::now(),
            claimed_at: None,
            completed_at: None,
            source: parent.source.clone(),
        }
    }

    /// `agent_id` is set if and only if the task is in one of the claimed
    /// family of statuses. Checked wherever the board mutates `agent_id` or
    /// `status`.
    pub fn agent_ownership_invariant_holds(&self) -> bool {
        let should_have_owner = matches!(
            self.status,
            TaskStatus::Claimed | TaskStatus::Review | TaskStatus::Critique | TaskStatus::Synthesizing
        );
        self.agent_id.is_some() == should_have_owner
    }

    pub fn is_ready(&self, completed_ids: &BTreeSet<String>) -> bool {
        self.status == TaskStatus::Pending && self.blocked_by.iter().all(|b| completed_ids.contains(b))
    }
}

//! The Orchestrator (C7): the single entry point an external channel calls
//! to submit user text and wait for a result, built on top of the Task
//! Router, the Task Board, and the Wakeup Bus.

use std::sync::Arc;
use std::time::Duration;
use swarmboard_board::Board;
use swarmboard_bus::WakeupBus;
use swarmboard_channel::{Channel, ChannelEvent, Phase};
use swarmboard_core::{Complexity, Source, SwarmError, SwarmResult, Task, TaskStatus};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::classifier::{classify, Classification};

/// How long [`Orchestrator::wait`] blocks by default before giving up.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const PROGRESS_INTERVAL: Duration = Duration::from_secs(30);

/// Ties the Task Router, Board, and Wakeup Bus together behind the
/// `submit`/`wait`/`cancel` contract an external channel drives.
#[derive(Clone)]
pub struct Orchestrator {
    board: Board,
    wakeup: WakeupBus,
    channel: Option<Arc<dyn Channel>>,
}

impl Orchestrator {
    pub fn new(board: Board, wakeup: WakeupBus) -> Self {
        Self { board, wakeup, channel: None }
    }

    pub fn with_channel(mut self, channel: Arc<dyn Channel>) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Classifies `user_text` and creates either a simple direct-answer
    /// task or a planner task, returning the new task's id. Never blocks
    /// on execution — a worker picks the task up on its own schedule.
    pub async fn submit(&self, user_text: impl Into<String>, channel_name: Option<String>) -> SwarmResult<String> {
        let user_text = user_text.into();
        let id = Uuid::new_v4().to_string();

        let classification = classify(&user_text);
        let (required_role, complexity) = match classification {
            Classification::DirectAnswer => ("direct", Complexity::Simple),
            Classification::Pipeline => ("planner", Complexity::Normal),
        };

        let mut source = Source::new(user_text.clone());
        source.channel = channel_name;

        let task = Task::new_root(id.clone(), user_text, Some(required_role.to_string()), complexity, source);
        self.board.create(task).await?;
        self.wakeup.notify().await;

        info!(task_id = %id, ?classification, "submitted task");
        Ok(id)
    }

    /// Polls the board until `task_id` reaches a terminal status or
    /// `timeout` elapses, emitting a status event roughly every 30s and a
    /// completion event once settled.
    pub async fn wait(&self, task_id: &str, timeout: Duration) -> SwarmResult<Task> {
        let start = Instant::now();
        let mut last_notified = start;

        loop {
            let Some(task) = self.board.get(task_id).await? else {
                return Err(SwarmError::Orchestrator(format!("task '{task_id}' not found")));
            };

            if task.status.is_terminal() {
                self.notify_completion(&task).await;
                return Ok(task);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                warn!(task_id, ?timeout, "wait timed out");
                return Err(SwarmError::Orchestrator(format!(
                    "task '{task_id}' did not settle within {timeout:?}"
                )));
            }

            if last_notified.elapsed() >= PROGRESS_INTERVAL {
                self.notify_progress(&task).await;
                last_notified = Instant::now();
            }

            let remaining = timeout - elapsed;
            tokio::time::sleep(POLL_INTERVAL.min(remaining)).await;
        }
    }

    /// Cancels `task_id` and every non-terminal descendant, cooperatively —
    /// workers observe the cancellation on their next poll of the board.
    pub async fn cancel(&self, task_id: &str) -> SwarmResult<Vec<String>> {
        self.board.cancel(task_id).await
    }

    async fn notify_progress(&self, task: &Task) {
        let Some(channel) = &self.channel else { return };
        let Some(name) = &task.source.channel else { return };
        let event = ChannelEvent::Status {
            phase: phase_for(task),
            agent: task.agent_id.clone().unwrap_or_else(|| "unassigned".to_string()),
            tool: None,
        };
        if let Err(e) = channel.send_event(&task.id, event).await {
            warn!(task_id = %task.id, channel = %name, error = %e, "failed to send progress event");
        }
    }

    async fn notify_completion(&self, task: &Task) {
        let Some(channel) = &self.channel else { return };
        if task.source.channel.is_none() {
            return;
        }
        let event = match task.status {
            TaskStatus::Completed => ChannelEvent::Complete {
                result: task.result.clone().unwrap_or_default(),
                task_id: task.id.clone(),
                files: vec![],
            },
            _ => ChannelEvent::Status {
                phase: phase_for(task),
                agent: task.agent_id.clone().unwrap_or_else(|| "unassigned".to_string()),
                tool: None,
            },
        };
        if let Err(e) = channel.send_event(&task.id, event).await {
            warn!(task_id = %task.id, error = %e, "failed to send completion event");
        }
    }
}

fn phase_for(task: &Task) -> Phase {
    match task.status {
        TaskStatus::Pending => Phase::Planning,
        TaskStatus::Claimed => Phase::Executing,
        TaskStatus::Review | TaskStatus::Critique => Phase::Critiquing,
        TaskStatus::Synthesizing => Phase::Synthesizing,
        _ => Phase::Executing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmboard_channel::InMemoryChannel;

    fn orchestrator(dir: &std::path::Path) -> Orchestrator {
        let board = Board::new(dir.join("task_board.json"));
        let wakeup = WakeupBus::new(dir.join("task_signals"));
        Orchestrator::new(board, wakeup)
    }

    #[tokio::test]
    async fn short_text_submits_as_direct_simple_task() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let id = orch.submit("hi", None).await.unwrap();
        let task = orch.board.get(&id).await.unwrap().unwrap();
        assert_eq!(task.required_role.as_deref(), Some("direct"));
        assert_eq!(task.complexity, Complexity::Simple);
    }

    #[tokio::test]
    async fn actionable_text_submits_as_planner_task() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let id = orch.submit("Implement a new caching layer for the API", None).await.unwrap();
        let task = orch.board.get(&id).await.unwrap().unwrap();
        assert_eq!(task.required_role.as_deref(), Some("planner"));
        assert_eq!(task.complexity, Complexity::Normal);
    }

    #[tokio::test]
    async fn wait_returns_immediately_once_task_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let id = orch.submit("hi", None).await.unwrap();
        orch.board.claim_next("agent-1", "direct", 0, None).await.unwrap();
        orch.board.complete(id.clone(), Some("hello yourself".into())).await.unwrap();

        let task = orch.wait(&id, Duration::from_secs(5)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result.as_deref(), Some("hello yourself"));
    }

    #[tokio::test]
    async fn wait_times_out_on_a_task_that_never_settles() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let id = orch.submit("Implement something that never finishes", None).await.unwrap();

        let result = orch.wait(&id, Duration::from_millis(200)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn wait_on_unknown_task_errors() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let result = orch.wait("nonexistent", Duration::from_millis(50)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn completion_event_is_delivered_when_a_channel_name_is_set() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Arc::new(InMemoryChannel::new("console"));
        let orch = orchestrator(dir.path()).with_channel(channel.clone());
        let id = orch.submit("hi", Some("console".into())).await.unwrap();
        orch.board.claim_next("agent-1", "direct", 0, None).await.unwrap();
        orch.board.complete(id.clone(), Some("hello yourself".into())).await.unwrap();

        orch.wait(&id, Duration::from_secs(5)).await.unwrap();
        assert!(!channel.history().is_empty());
    }

    #[tokio::test]
    async fn cancel_delegates_to_the_board() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path());
        let id = orch.submit("Build out a whole new subsystem", None).await.unwrap();
        let cancelled = orch.cancel(&id).await.unwrap();
        assert!(cancelled.contains(&id));
        let task = orch.board.get(&id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
    }
}

//! The external channel contract (§6.2): the per-task event stream the
//! core emits, and the sinks a delivery surface (CLI console, a future
//! chat-platform adapter) must provide.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use swarmboard_core::SwarmResult;

/// A phase the orchestrator moves a task through, reported via
/// [`ChannelEvent::Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Planning,
    Executing,
    Critiquing,
    Synthesizing,
}

/// One event in a task's delivery stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChannelEvent {
    Status {
        phase: Phase,
        agent: String,
        tool: Option<String>,
    },
    Partial {
        text: String,
    },
    Complete {
        result: String,
        task_id: String,
        files: Vec<String>,
    },
}

/// A delivery surface a task's progress and result are pushed to. Every
/// method is a sink the core calls; it never reads back from a channel.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    /// Pushes one status/partial/complete event for `task_id`.
    async fn send_event(&self, task_id: &str, event: ChannelEvent) -> SwarmResult<()>;

    /// Forwards a file attachment, e.g. a synthesis artifact, to the user.
    async fn send_file(&self, path: &Path, caption: &str) -> SwarmResult<()>;

    /// Delivers a plain-text message outside the structured event stream.
    async fn deliver_text(&self, text: &str) -> SwarmResult<()>;
}

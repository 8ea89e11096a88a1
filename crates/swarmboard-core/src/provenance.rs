//! Provenance records: where a task or context-bus entry came from.

use serde::{Deserialize, Serialize};

/// Where a context-bus entry originated: a worker publishing its own
/// findings, a tool invocation, or a replayed task result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceKind {
    Agent,
    Tool,
    TaskResult,
}

/// Attached to a [`crate::context_entry::ContextEntry`], tracing which agent,
/// channel, and task produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub kind: ProvenanceKind,
    pub source_agent: String,
    pub source_channel: Option<String>,
    pub source_task_id: Option<String>,
}

impl Provenance {
    pub fn agent(source_agent: impl Into<String>) -> Self {
        Self {
            kind: ProvenanceKind::Agent,
            source_agent: source_agent.into(),
            source_channel: None,
            source_task_id: None,
        }
    }

    pub fn from_task(source_agent: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            kind: ProvenanceKind::TaskResult,
            source_agent: source_agent.into(),
            source_channel: None,
            source_task_id: Some(task_id.into()),
        }
    }
}

/// Where a root task's originating request came from: the channel it was
/// delivered on, the chat/thread id within that channel, the end-user id,
/// and the raw text submitted. Sub-tasks inherit their parent's `Source`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Source {
    pub channel: Option<String>,
    pub chat_id: Option<String>,
    pub user_id: Option<String>,
    pub original_text: String,
}

impl Source {
    pub fn new(original_text: impl Into<String>) -> Self {
        Self {
            original_text: original_text.into(),
            ..Default::default()
        }
    }
}

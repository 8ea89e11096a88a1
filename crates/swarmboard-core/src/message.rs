//! Conversation turns exchanged between an agent worker and its model
//! provider, and the `ToolCall`/`ToolResult` pair threaded through them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// The role of the participant that authored a [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A single turn in a worker's short-term conversation window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// The task whose claim produced this conversation.
    pub task_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            task_id: task_id.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn system(content: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self::new(Role::System, content, task_id)
    }

    pub fn user(content: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self::new(Role::User, content, task_id)
    }

    pub fn assistant(content: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, task_id)
    }

    pub fn tool(content: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self::new(Role::Tool, content, task_id)
    }
}

/// A request from the model to invoke a specific tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// The result returned by the Tool Dispatcher after executing a [`ToolCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

//! Per-recipient mailbox messages (§3.5). Delivery is at-least-once,
//! ordered per sender-recipient pair; consumers must be idempotent.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of a [`MailboxMessage`]. `Shutdown` is handled with highest
/// priority by the worker loop regardless of queue position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Shutdown,
    CritiqueRequest,
    CritiqueReply,
    Message,
}

/// One record appended to a recipient's mailbox log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub content: serde_json::Value,
    pub ts: DateTime<Utc>,
}

impl MailboxMessage {
    pub fn new(
        from: impl Into<String>,
        message_type: MessageType,
        content: serde_json::Value,
    ) -> Self {
        Self {
            from: from.into(),
            message_type,
            content,
            ts: Utc::now(),
        }
    }

    pub fn shutdown(from: impl Into<String>) -> Self {
        Self::new(from, MessageType::Shutdown, serde_json::Value::Null)
    }

    /// Payload: `{ "task_id", "description", "result" }`, per §4.7.
    pub fn critique_request(
        from: impl Into<String>,
        task_id: impl Into<String>,
        description: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self::new(
            from,
            MessageType::CritiqueRequest,
            serde_json::json!({
                "task_id": task_id.into(),
                "description": description.into(),
                "result": result.into(),
            }),
        )
    }
}

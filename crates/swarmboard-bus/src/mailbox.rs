//! Mailbox (C3): per-recipient append-only log. `send` appends one record
//! under a per-recipient lock; `read` drains the whole log atomically
//! (read-then-truncate), per §4.3. Delivery is at-least-once and ordered
//! per sender-recipient pair; consumers must be idempotent.

use crate::lock::ExclusiveLock;
use std::path::PathBuf;
use swarmboard_core::{MailboxMessage, SwarmResult};

/// A handle to the mailbox directory; `send`/`read` target one file per
/// recipient (`mailboxes/<agent_id>.jsonl`) with its own lockfile.
#[derive(Clone)]
pub struct MailboxHub {
    dir: std::sync::Arc<PathBuf>,
}

impl MailboxHub {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: std::sync::Arc::new(dir.into()),
        }
    }

    fn log_path(&self, recipient: &str) -> PathBuf {
        self.dir.join(format!("{recipient}.jsonl"))
    }

    fn lock_path(&self, recipient: &str) -> PathBuf {
        self.dir.join(format!(".{recipient}.jsonl.lock"))
    }

    /// Appends one record to `to`'s log.
    pub async fn send(&self, to: impl Into<String>, message: MailboxMessage) -> SwarmResult<()> {
        let to = to.into();
        let log_path = self.log_path(&to);
        let lock_path = self.lock_path(&to);
        tokio::task::spawn_blocking(move || {
            if let Some(dir) = log_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut line = serde_json::to_string(&message)?;
            line.push('\n');
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)?;
            file.write_all(line.as_bytes())?;
            Ok(())
        })
        .await
        .expect("mailbox send panicked")
    }

    /// Reads and truncates `recipient`'s entire log, returning the drained
    /// batch in append order. The reader is the sole consumer.
    pub async fn read(&self, recipient: impl Into<String>) -> SwarmResult<Vec<MailboxMessage>> {
        let recipient = recipient.into();
        let log_path = self.log_path(&recipient);
        let lock_path = self.lock_path(&recipient);
        tokio::task::spawn_blocking(move || {
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let contents = match std::fs::read_to_string(&log_path) {
                Ok(s) => s,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                Err(e) => return Err(e.into()),
            };
            let messages = parse_jsonl(&contents);
            std::fs::write(&log_path, b"")?;
            Ok(messages)
        })
        .await
        .expect("mailbox read panicked")
    }

    /// True if `message_type = shutdown` is present in a drained batch.
    pub fn has_shutdown(messages: &[MailboxMessage]) -> bool {
        messages
            .iter()
            .any(|m| m.message_type == swarmboard_core::MessageType::Shutdown)
    }
}

fn parse_jsonl(contents: &str) -> Vec<MailboxMessage> {
    contents
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmboard_core::MessageType;

    #[tokio::test]
    async fn send_then_read_drains_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let hub = MailboxHub::new(dir.path().join("mailboxes"));
        hub.send("planner", MailboxMessage::new("coder-1", MessageType::Message, serde_json::json!("one")))
            .await
            .unwrap();
        hub.send("planner", MailboxMessage::new("coder-2", MessageType::Message, serde_json::json!("two")))
            .await
            .unwrap();

        let drained = hub.read("planner").await.unwrap();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].from, "coder-1");
        assert_eq!(drained[1].from, "coder-2");

        let second = hub.read("planner").await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn shutdown_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let hub = MailboxHub::new(dir.path().join("mailboxes"));
        hub.send("coder-1", MailboxMessage::shutdown("runtime")).await.unwrap();
        let drained = hub.read("coder-1").await.unwrap();
        assert!(MailboxHub::has_shutdown(&drained));
    }

    #[tokio::test]
    async fn read_on_empty_mailbox_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let hub = MailboxHub::new(dir.path().join("mailboxes"));
        let drained = hub.read("nobody").await.unwrap();
        assert!(drained.is_empty());
    }
}

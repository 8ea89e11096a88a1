//! An in-memory reference [`Channel`]: records everything sent to it and
//! fans it out to subscribers over a broadcast channel.

use crate::channel::{Channel, ChannelEvent};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Mutex;
use swarmboard_core::SwarmResult;
use tokio::sync::broadcast;

/// One recorded delivery, kept for test assertions and late subscribers
/// who only need the history rather than the live stream.
#[derive(Debug, Clone)]
pub enum Delivery {
    Event { task_id: String, event: ChannelEvent },
    File { path: String, caption: String },
    Text(String),
}

pub struct InMemoryChannel {
    name: String,
    history: Mutex<Vec<Delivery>>,
    tx: broadcast::Sender<Delivery>,
}

impl InMemoryChannel {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            name: name.into(),
            history: Mutex::new(Vec::new()),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Delivery> {
        self.tx.subscribe()
    }

    pub fn history(&self) -> Vec<Delivery> {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, delivery: Delivery) {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).push(delivery.clone());
        let _ = self.tx.send(delivery);
    }
}

#[async_trait]
impl Channel for InMemoryChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_event(&self, task_id: &str, event: ChannelEvent) -> SwarmResult<()> {
        self.record(Delivery::Event {
            task_id: task_id.to_string(),
            event,
        });
        Ok(())
    }

    async fn send_file(&self, path: &Path, caption: &str) -> SwarmResult<()> {
        self.record(Delivery::File {
            path: path.display().to_string(),
            caption: caption.to_string(),
        });
        Ok(())
    }

    async fn deliver_text(&self, text: &str) -> SwarmResult<()> {
        self.record(Delivery::Text(text.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Phase;

    #[tokio::test]
    async fn records_every_delivery_kind() {
        let channel = InMemoryChannel::new("console");
        channel
            .send_event(
                "t1",
                ChannelEvent::Status {
                    phase: Phase::Planning,
                    agent: "planner-1".into(),
                    tool: None,
                },
            )
            .await
            .unwrap();
        channel.deliver_text("hello").await.unwrap();
        channel.send_file(Path::new("/tmp/out.md"), "synthesis").await.unwrap();

        assert_eq!(channel.history().len(), 3);
    }

    #[tokio::test]
    async fn subscribers_observe_live_deliveries() {
        let channel = InMemoryChannel::new("console");
        let mut rx = channel.subscribe();
        channel.deliver_text("ping").await.unwrap();
        let delivery = rx.recv().await.unwrap();
        assert!(matches!(delivery, Delivery::Text(t) if t == "ping"));
    }
}

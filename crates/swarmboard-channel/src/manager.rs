//! Routes a task's events to whichever channel(s) it was submitted from
//! (§4.7's `source` propagation) and broadcasts where no single target is
//! named.

use crate::channel::{Channel, ChannelEvent};
use std::collections::HashMap;
use std::path::Path;
use swarmboard_core::{SwarmError, SwarmResult};

pub struct ChannelManager {
    channels: HashMap<String, Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    pub fn add_channel(&mut self, channel: Box<dyn Channel>) {
        let name = channel.name().to_string();
        self.channels.insert(name, channel);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Channel> {
        self.channels.get(name).map(std::convert::AsRef::as_ref)
    }

    pub async fn send_event(&self, channel_name: &str, task_id: &str, event: ChannelEvent) -> SwarmResult<()> {
        let channel = self.channels.get(channel_name).ok_or_else(|| {
            SwarmError::Channel(format!("channel '{channel_name}' not found"))
        })?;
        channel.send_event(task_id, event).await
    }

    /// Broadcasts one event to every registered channel, collecting
    /// per-channel failures rather than aborting on the first.
    pub async fn broadcast_event(&self, task_id: &str, event: ChannelEvent) -> Vec<SwarmError> {
        let mut errors = Vec::new();
        for (name, channel) in &self.channels {
            if let Err(e) = channel.send_event(task_id, event.clone()).await {
                tracing::warn!(channel = %name, error = %e, "broadcast event failed");
                errors.push(e);
            }
        }
        errors
    }

    pub async fn send_file(&self, channel_name: &str, path: &Path, caption: &str) -> SwarmResult<()> {
        let channel = self.channels.get(channel_name).ok_or_else(|| {
            SwarmError::Channel(format!("channel '{channel_name}' not found"))
        })?;
        channel.send_file(path, caption).await
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.keys().map(String::as_str).collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

//! Context Bus entries: namespaced, TTL'd, layered key-value facts that
//! agents publish for each other to read when building prompts.

use crate::provenance::Provenance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Retention tier. Determines the default TTL when none is given explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Layer {
    /// Lives until the owning task reaches a terminal status.
    Task,
    /// 3 600 s.
    Session,
    /// 86 400 s.
    Short,
    /// Never expires.
    Long,
}

impl Layer {
    /// Default TTL in seconds, or `None` for layers that expire with a task
    /// or never expire (both represented without a numeric TTL).
    pub fn default_ttl_seconds(self) -> Option<u64> {
        match self {
            Layer::Task => None,
            Layer::Session => Some(3_600),
            Layer::Short => Some(86_400),
            Layer::Long => None,
        }
    }
}

/// One entry in the Context Bus, keyed by `"{agent_id}:{key}"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextEntry {
    pub agent_id: String,
    pub key: String,
    pub value: serde_json::Value,
    pub layer: Layer,
    /// `None` means "use the layer default"; `Layer::Task`/`Layer::Long`
    /// entries with a `None` here never expire by elapsed time (Task entries
    /// instead expire when their owning task goes terminal).
    pub ttl_seconds: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub provenance: Provenance,
    /// Set when `layer = Task`; the entry is pruned once this task is
    /// terminal regardless of elapsed time.
    pub owning_task_id: Option<String>,
}

impl ContextEntry {
    pub fn new(
        agent_id: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
        layer: Layer,
        ttl_seconds: Option<u64>,
        provenance: Provenance,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            key: key.into(),
            value,
            layer,
            ttl_seconds,
            timestamp: Utc::now(),
            provenance,
            owning_task_id: None,
        }
    }

    /// The namespaced key as stored and looked up: `"{agent_id}:{key}"`.
    pub fn namespaced_key(&self) -> String {
        format!("{}:{}", self.agent_id, self.key)
    }

    /// Effective TTL: explicit override, else the layer default.
    pub fn effective_ttl_seconds(&self) -> Option<u64> {
        self.ttl_seconds.or_else(|| self.layer.default_ttl_seconds())
    }

    /// True once `now` is past `timestamp + ttl`. Entries with no numeric
    /// TTL (Long, or Task awaiting its task's terminal status) never expire
    /// by this check alone.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.effective_ttl_seconds() {
            Some(ttl) => {
                let elapsed = (now - self.timestamp).num_seconds();
                elapsed >= 0 && elapsed as u64 >= ttl
            }
            None => false,
        }
    }
}

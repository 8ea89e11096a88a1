//! Context Bus (C2): file-backed, namespaced, layered key-value facts
//! agents publish for each other. `publish`/`get` serialize on a single
//! global lock; expired entries are pruned lazily on read, per §4.2.

use crate::lock::{sibling_lock_path, ExclusiveLock};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swarmboard_core::{ContextEntry, Layer, Provenance, SwarmResult};

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct BusDocument {
    entries: HashMap<String, ContextEntry>,
}

fn read_or_default(path: &Path) -> SwarmResult<BusDocument> {
    match std::fs::read_to_string(path) {
        Ok(s) => serde_json::from_str(&s)
            .map_err(|e| swarmboard_core::SwarmError::Bus(format!("malformed context bus document: {e}"))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BusDocument::default()),
        Err(e) => Err(e.into()),
    }
}

fn write_atomic(path: &Path, doc: &BusDocument) -> SwarmResult<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(".context_bus.tmp");
    std::fs::write(&tmp, serde_json::to_string_pretty(doc)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// A handle to one context bus document.
#[derive(Clone)]
pub struct ContextBus {
    path: Arc<PathBuf>,
}

impl ContextBus {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    /// Inserts or updates the namespaced entry under the bus lock. `ttl`
    /// overrides the layer default when given.
    pub async fn publish(
        &self,
        agent_id: impl Into<String>,
        key: impl Into<String>,
        value: serde_json::Value,
        layer: Layer,
        ttl_seconds: Option<u64>,
        provenance: Provenance,
    ) -> SwarmResult<()> {
        let path = self.path.clone();
        let agent_id = agent_id.into();
        let key = key.into();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc = read_or_default(&path)?;
            let entry = ContextEntry::new(agent_id, key, value, layer, ttl_seconds, provenance);
            doc.entries.insert(entry.namespaced_key(), entry);
            write_atomic(&path, &doc)
        })
        .await
        .expect("context bus publish panicked")
    }

    /// Returns the entry iff present and not expired; expired entries are
    /// dropped from the document as a side effect (lazy pruning on read).
    pub async fn get(&self, agent_id: &str, key: &str) -> SwarmResult<Option<ContextEntry>> {
        let namespaced = format!("{agent_id}:{key}");
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc = read_or_default(&path)?;
            let now = Utc::now();
            let found = doc.entries.get(&namespaced).cloned();
            match &found {
                Some(e) if e.is_expired(now) => {
                    doc.entries.remove(&namespaced);
                    write_atomic(&path, &doc)?;
                    Ok(None)
                }
                other => Ok(other.clone()),
            }
        })
        .await
        .expect("context bus get panicked")
    }

    /// All unexpired entries, pruning expired ones as a side effect.
    pub async fn snapshot(&self) -> SwarmResult<Vec<ContextEntry>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc = read_or_default(&path)?;
            let now = Utc::now();
            let before = doc.entries.len();
            doc.entries.retain(|_, e| !e.is_expired(now));
            if doc.entries.len() != before {
                write_atomic(&path, &doc)?;
            }
            Ok(doc.entries.into_values().collect())
        })
        .await
        .expect("context bus snapshot panicked")
    }

    /// Removes every `Layer::Task` entry owned by `task_id`; called by the
    /// board (or its caller) once a task reaches a terminal status.
    pub async fn prune_task(&self, task_id: &str) -> SwarmResult<()> {
        let task_id = task_id.to_string();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc = read_or_default(&path)?;
            doc.entries
                .retain(|_, e| e.owning_task_id.as_deref() != Some(task_id.as_str()));
            write_atomic(&path, &doc)
        })
        .await
        .expect("context bus prune_task panicked")
    }
}

//! The file-backed Task Board (C1): the async, locked wrapper callers use.
//! Every mutating method acquires the exclusive lock, re-reads the whole
//! document, applies the state machine, writes atomically, and releases —
//! matching §4.1's atomicity contract. Readers (`snapshot`) take no lock and
//! tolerate eventual consistency between snapshots, per the same section.

use crate::document::{BoardDocument, Claimant};
use crate::io::{read_or_default, write_atomic};
use crate::lock::{sibling_lock_path, ExclusiveLock};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use swarmboard_core::{CritiqueSpec, SwarmResult, Task};

/// A handle to one task board, rooted at a single JSON document on disk.
#[derive(Clone)]
pub struct Board {
    path: Arc<PathBuf>,
}

impl Board {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    /// Snapshot read: no lock, may race a concurrent writer. Callers must
    /// tolerate eventual consistency, per §4.1.
    pub async fn snapshot(&self) -> SwarmResult<Vec<Task>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let doc: BoardDocument = read_or_default(&path)?;
            Ok(doc.tasks.into_values().collect())
        })
        .await
        .expect("board snapshot task panicked")
    }

    pub async fn get(&self, id: &str) -> SwarmResult<Option<Task>> {
        let path = self.path.clone();
        let id = id.to_string();
        tokio::task::spawn_blocking(move || {
            let doc: BoardDocument = read_or_default(&path)?;
            Ok(doc.tasks.get(&id).cloned())
        })
        .await
        .expect("board get task panicked")
    }

    /// Runs `mutate` under the exclusive lock against a freshly re-read
    /// document, persisting the result atomically on success. The document
    /// is left untouched on error.
    async fn mutate<F>(&self, mutate: F) -> SwarmResult<()>
    where
        F: FnOnce(&mut BoardDocument) -> SwarmResult<()> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc: BoardDocument = read_or_default(&path)?;
            mutate(&mut doc)?;
            write_atomic(&path, &doc)
        })
        .await
        .expect("board mutation task panicked")
    }

    pub async fn create(&self, task: Task) -> SwarmResult<()> {
        self.mutate(move |doc| doc.create(task)).await
    }

    /// Claims the next claimable pending task for `agent_id`, returning its
    /// id, or `None` if nothing is claimable right now.
    pub async fn claim_next(
        &self,
        agent_id: impl Into<String>,
        role: impl Into<String>,
        reputation: i64,
        restricted_to_roles: Option<Vec<String>>,
    ) -> SwarmResult<Option<String>> {
        let agent_id = agent_id.into();
        let role = role.into();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc: BoardDocument = read_or_default(&path)?;
            let restricted: Option<Vec<&str>> = restricted_to_roles
                .as_ref()
                .map(|v| v.iter().map(String::as_str).collect());
            let claimant = Claimant {
                agent_id: &agent_id,
                role: &role,
                reputation,
                restricted_to_roles: restricted.as_deref(),
            };
            let Some(id) = doc.next_claimable(&claimant).map(|t| t.id.clone()) else {
                return Ok(None);
            };
            doc.claim(&id, &claimant)?;
            write_atomic(&path, &doc)?;
            Ok(Some(id))
        })
        .await
        .expect("claim_next task panicked")
    }

    pub async fn claim(
        &self,
        id: impl Into<String>,
        agent_id: impl Into<String>,
        role: impl Into<String>,
        reputation: i64,
    ) -> SwarmResult<()> {
        let id = id.into();
        let agent_id = agent_id.into();
        let role = role.into();
        self.mutate(move |doc| {
            let claimant = Claimant {
                agent_id: &agent_id,
                role: &role,
                reputation,
                restricted_to_roles: None,
            };
            doc.claim(&id, &claimant)
        })
        .await
    }

    pub async fn submit_for_review(&self, id: impl Into<String>, result: impl Into<String>) -> SwarmResult<()> {
        let id = id.into();
        let result = result.into();
        self.mutate(move |doc| doc.submit_for_review(&id, result)).await
    }

    pub async fn complete(&self, id: impl Into<String>, result: Option<String>) -> SwarmResult<()> {
        let id = id.into();
        self.mutate(move |doc| doc.complete(&id, result)).await
    }

    pub async fn begin_synthesis(&self, id: impl Into<String>) -> SwarmResult<()> {
        let id = id.into();
        self.mutate(move |doc| doc.begin_synthesis(&id)).await
    }

    pub async fn add_critique(&self, id: impl Into<String>, critique: CritiqueSpec) -> SwarmResult<()> {
        let id = id.into();
        self.mutate(move |doc| doc.add_critique(&id, critique)).await
    }

    pub async fn claim_critique(&self, id: impl Into<String>, agent_id: impl Into<String>) -> SwarmResult<()> {
        let id = id.into();
        let agent_id = agent_id.into();
        self.mutate(move |doc| doc.claim_critique(&id, &agent_id)).await
    }

    pub async fn cancel(&self, id: impl Into<String>) -> SwarmResult<Vec<String>> {
        let id = id.into();
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc: BoardDocument = read_or_default(&path)?;
            let cancelled = doc.cancel_with_descendants(&id)?;
            write_atomic(&path, &doc)?;
            Ok(cancelled)
        })
        .await
        .expect("cancel task panicked")
    }

    pub async fn pause(&self, id: impl Into<String>) -> SwarmResult<()> {
        let id = id.into();
        self.mutate(move |doc| doc.pause(&id)).await
    }

    pub async fn resume(&self, id: impl Into<String>) -> SwarmResult<()> {
        let id = id.into();
        self.mutate(move |doc| doc.resume(&id)).await
    }

    pub async fn fail(&self, id: impl Into<String>, reason: impl Into<String>) -> SwarmResult<()> {
        let id = id.into();
        let reason = reason.into();
        self.mutate(move |doc| doc.fail(&id, &reason)).await
    }

    pub async fn retry(&self, id: impl Into<String>) -> SwarmResult<()> {
        let id = id.into();
        self.mutate(move |doc| doc.retry(&id)).await
    }

    /// Runs the stale-recovery sweep (§4.1) once, returning recovered task
    /// ids. Safe to call from any reader on a ~30 s tick.
    pub async fn recover_stale_tasks(&self) -> SwarmResult<Vec<String>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let lock_path = sibling_lock_path(&path);
            let _lock = ExclusiveLock::acquire(&lock_path)?;
            let mut doc: BoardDocument = read_or_default(&path)?;
            let recovered = doc.recover_stale(Utc::now());
            if !recovered.is_empty() {
                write_atomic(&path, &doc)?;
            }
            Ok(recovered)
        })
        .await
        .expect("recover_stale_tasks panicked")
    }

    /// True once `id` (or an ancestor, for a descendant check performed by
    /// the caller) is cancelled. Workers poll this between tool iterations.
    pub async fn is_cancelled(&self, id: &str) -> SwarmResult<bool> {
        Ok(self
            .get(id)
            .await?
            .map(|t| t.status == swarmboard_core::TaskStatus::Cancelled)
            .unwrap_or(false))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmboard_core::{Complexity, Dimensions, Source};

    fn task(id: &str) -> Task {
        Task::new_root(id, "do a thing", None, Complexity::Normal, Source::new("x"))
    }

    #[tokio::test]
    async fn create_then_claim_then_submit_and_review() {
        let dir = tempfile::tempdir().unwrap();
        let board = Board::new(dir.path().join("task_board.json"));
        board.create(task("t1")).await.unwrap();

        let claimed = board.claim_next("coder-1", "implement", 100, None).await.unwrap();
        assert_eq!(claimed.as_deref(), Some("t1"));

        board.submit_for_review("t1", "the result").await.unwrap();
        let snapshot = board.snapshot().await.unwrap();
        let t = snapshot.iter().find(|t| t.id == "t1").unwrap();
        assert_eq!(t.status, swarmboard_core::TaskStatus::Review);

        let critique = CritiqueSpec::derive(
            Dimensions {
                accuracy: 9,
                completeness: 9,
                technical: 9,
                calibration: 9,
                efficiency: 9,
            },
            vec![],
            0.9,
        );
        board.add_critique("t1", critique).await.unwrap();
        let t = board.get("t1").await.unwrap().unwrap();
        assert_eq!(t.status, swarmboard_core::TaskStatus::Completed);
    }

    #[tokio::test]
    async fn concurrent_claims_never_double_assign() {
        let dir = tempfile::tempdir().unwrap();
        let board = Board::new(dir.path().join("task_board.json"));
        for i in 0..5 {
            board.create(task(&format!("t{i}"))).await.unwrap();
        }

        let mut handles = Vec::new();
        for n in 0..5 {
            let board = board.clone();
            handles.push(tokio::spawn(async move {
                board
                    .claim_next(format!("agent-{n}"), "implement", 100, None)
                    .await
                    .unwrap()
            }));
        }
        let mut claimed_ids = Vec::new();
        for h in handles {
            if let Some(id) = h.await.unwrap() {
                claimed_ids.push(id);
            }
        }
        claimed_ids.sort();
        claimed_ids.dedup();
        assert_eq!(claimed_ids.len(), 5);
    }

    #[tokio::test]
    async fn cancel_cascades_and_recover_stale_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let board = Board::new(dir.path().join("task_board.json"));
        board.create(task("p")).await.unwrap();
        let parent = board.get("p").await.unwrap().unwrap();
        let child = Task::child_of(&parent, "p-a", "sub", None, Complexity::Normal, Default::default());
        board.create(child).await.unwrap();

        let cancelled = board.cancel("p").await.unwrap();
        assert!(cancelled.contains(&"p-a".to_string()));

        let first = board.recover_stale_tasks().await.unwrap();
        let second = board.recover_stale_tasks().await.unwrap();
        assert!(first.is_empty());
        assert!(second.is_empty());
    }
}

//! Wakeup Bus (C4): edge-triggered, level-reset notification, intra-process
//! via [`tokio::sync::Notify`] (a precise fit for "multiple notifies may
//! coalesce into a single wake", §4.4), layered with a best-effort
//! `task_signals/` touch-file directory for the cross-process case.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use swarmboard_core::SwarmResult;
use tokio::sync::Notify;

/// One wakeup channel, shared by every worker in this process plus a
/// best-effort cross-process signal directory.
#[derive(Clone)]
pub struct WakeupBus {
    notify: Arc<Notify>,
    signals_dir: Arc<PathBuf>,
}

impl WakeupBus {
    pub fn new(signals_dir: impl Into<PathBuf>) -> Self {
        Self {
            notify: Arc::new(Notify::new()),
            signals_dir: Arc::new(signals_dir.into()),
        }
    }

    /// Wakes any current or next waiter. Also drops a zero-byte touch file
    /// under `signals_dir` for sibling processes that are not sharing this
    /// `Notify` instance; best-effort, failures are ignored.
    pub async fn notify(&self) {
        self.notify.notify_waiters();
        self.notify.notify_one();
        let _ = self.touch_signal().await;
    }

    async fn touch_signal(&self) -> SwarmResult<()> {
        tokio::fs::create_dir_all(&*self.signals_dir).await?;
        let path = self.signals_dir.join(format!("{}", uuid_like_stamp()));
        tokio::fs::write(&path, b"").await?;
        Ok(())
    }

    /// Blocks until notified or `timeout` elapses, then clears the
    /// cross-process signal the caller observed (per the Open Question
    /// decision: consumers delete a touch file immediately after seeing
    /// it; no janitor).
    pub async fn wait(&self, timeout: Duration) {
        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => {}
            _ = tokio::time::sleep(timeout) => {}
        }
        self.drain_signals().await;
    }

    async fn drain_signals(&self) {
        let Ok(mut entries) = tokio::fs::read_dir(&*self.signals_dir).await else {
            return;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let _ = tokio::fs::remove_file(entry.path()).await;
        }
    }

    pub fn signals_dir(&self) -> &Path {
        &self.signals_dir
    }
}

fn uuid_like_stamp() -> u128 {
    // Non-colliding enough for a scratch touch-file name; real uniqueness
    // is unnecessary since any file in the directory just means "something
    // happened" and every reader drains the whole directory.
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    (std::process::id() as u128) << 64 | COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed) as u128
}

//! `WorkerHandle`: the extension point where an OS-process backend would
//! plug in. This implementation models agent workers as `tokio::spawn`-ed
//! async tasks rather than child processes.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use swarmboard_bus::MailboxHub;
use swarmboard_core::{MailboxMessage, SwarmResult};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// A running (or exited) worker. Implementations decide how "shutdown"
/// and "kill" map onto their concurrency primitive.
#[async_trait]
pub trait WorkerHandle: Send + Sync {
    /// Requests a graceful shutdown and returns immediately; the worker is
    /// expected to finish its current tool-loop iteration then exit.
    async fn request_shutdown(&self) -> SwarmResult<()>;

    /// Forcefully terminates the worker without waiting for cooperation.
    async fn force_kill(&self);

    /// True once the worker has exited, cooperatively or otherwise.
    async fn is_finished(&self) -> bool;

    /// Blocks until the worker exits.
    async fn join(&self);
}

/// A [`WorkerHandle`] backed by a `tokio::spawn`-ed task. Graceful shutdown
/// is requested via a `shutdown` mailbox message (§4.5: "signal graceful
/// shutdown (via mailbox)"); forceful termination aborts the task.
pub struct TaskWorkerHandle {
    agent_id: String,
    mailbox: MailboxHub,
    join: Mutex<Option<JoinHandle<()>>>,
}

impl TaskWorkerHandle {
    pub fn new(agent_id: impl Into<String>, mailbox: MailboxHub, join: JoinHandle<()>) -> Self {
        Self {
            agent_id: agent_id.into(),
            mailbox,
            join: Mutex::new(Some(join)),
        }
    }
}

#[async_trait]
impl WorkerHandle for TaskWorkerHandle {
    async fn request_shutdown(&self) -> SwarmResult<()> {
        self.mailbox
            .send(self.agent_id.clone(), MailboxMessage::shutdown("runtime"))
            .await
    }

    async fn force_kill(&self) {
        if let Some(join) = self.join.lock().await.take() {
            join.abort();
        }
    }

    async fn is_finished(&self) -> bool {
        self.join
            .lock()
            .await
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    async fn join(&self) {
        if let Some(join) = self.join.lock().await.take() {
            let _ = join.await;
        }
    }
}

/// Launches a [`WorkerHandle`] for a given agent id. The default
/// implementation wraps an async closure in `tokio::spawn`; an OS-process
/// backend would implement this trait instead, spawning a
/// `tokio::process::Command` wired to the same board/bus/mailbox paths.
pub trait WorkerFactory: Send + Sync {
    fn launch(&self, agent_id: &str) -> Arc<dyn WorkerHandle>;
}

/// A [`WorkerFactory`] that runs each agent's main loop as an async task,
/// built from a per-agent-id future constructor.
pub struct AsyncTaskFactory<F> {
    mailbox: MailboxHub,
    make_future: F,
}

impl<F, Fut> AsyncTaskFactory<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub fn new(mailbox: MailboxHub, make_future: F) -> Self {
        Self { mailbox, make_future }
    }
}

impl<F, Fut> WorkerFactory for AsyncTaskFactory<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn launch(&self, agent_id: &str) -> Arc<dyn WorkerHandle> {
        let future = (self.make_future)(agent_id.to_string());
        let join = tokio::spawn(future);
        Arc::new(TaskWorkerHandle::new(agent_id, self.mailbox.clone(), join))
    }
}

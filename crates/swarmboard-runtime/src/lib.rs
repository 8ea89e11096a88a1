//! Lazy Runtime (C5): on-demand supervision of agent worker processes.

pub mod handle;
pub mod registry;
pub mod supervisor;

pub use handle::{AsyncTaskFactory, TaskWorkerHandle, WorkerFactory, WorkerHandle};
pub use registry::{AgentDefinition, AgentState, RuntimeConfig};
pub use supervisor::LazyRuntime;

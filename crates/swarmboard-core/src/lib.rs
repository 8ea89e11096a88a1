//! Shared data types and error definitions for the swarmboard coordination
//! core.
//!
//! This crate has no I/O and no async: it is the vocabulary every other
//! `swarmboard-*` crate serializes, persists, and passes across the board,
//! bus, and mailbox boundaries.
//!
//! # Main types
//!
//! - [`SwarmError`] / [`SwarmResult`] — unified error enum for all
//!   subsystems.
//! - [`Task`] / [`TaskStatus`] / [`Complexity`] — the Task Board's unit of
//!   work.
//! - [`CritiqueSpec`] / [`Verdict`] — structured review output.
//! - [`SubTaskSpec`] — a planner's decomposed unit of work.
//! - [`ContextEntry`] / [`Layer`] — Context Bus entries.
//! - [`MailboxMessage`] / [`MessageType`] — per-recipient mailbox records.
//! - [`Message`] / [`Role`] / [`ToolCall`] / [`ToolResult`] — conversational
//!   turns and tool invocations.

pub mod context_entry;
pub mod critique;
pub mod error;
pub mod mailbox;
pub mod message;
pub mod provenance;
pub mod subtask;
pub mod task;
pub mod tool;

pub use context_entry::{ContextEntry, Layer};
pub use critique::{CritiqueItem, CritiqueSpec, Dimensions, Verdict};
pub use error::{SwarmError, SwarmResult};
pub use mailbox::{MailboxMessage, MessageType};
pub use message::{Message, Role, ToolCall, ToolResult};
pub use provenance::{Provenance, ProvenanceKind, Source};
pub use subtask::{A2aHint, OutputFormat, SubTaskSpec};
pub use task::{Complexity, Task, TaskStatus};
pub use tool::ToolSchema;

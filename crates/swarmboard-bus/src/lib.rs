//! Context Bus (C2), Mailbox (C3), and Wakeup Bus (C4): the file-backed
//! shared state and peer-to-peer messaging layer between agent workers.

pub mod context;
pub mod lock;
pub mod mailbox;
pub mod wakeup;

pub use context::ContextBus;
pub use mailbox::MailboxHub;
pub use wakeup::WakeupBus;

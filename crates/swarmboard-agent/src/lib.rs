//! Agent Worker Loop (C8) and Resilient Model Client (C9): the per-agent
//! tick that claims and executes board tasks, wrapped around a
//! provider-agnostic model client with retry, circuit-breaking, credential
//! rotation, and usage accounting.
//!
//! # Main types
//!
//! - [`AgentWorker`] — drives one agent's tick: mailbox scan, critique
//!   revision, claim-and-run, idle backoff.
//! - [`ProviderRouter`] / [`ProviderEntry`] — the resilient model client:
//!   selects among providers, retries, falls back, records usage.
//! - [`ModelProvider`] — the contract a concrete backend (`ClaudeProvider`,
//!   `OpenAiProvider`) implements.
//! - [`WorkerConfig`] — per-worker tuning (roles, iteration and idle caps,
//!   prompt budget).
//! - [`ContextWindow`] — budget-aware conversation window.

/// Concrete [`ModelProvider`] implementations.
pub mod backends;
/// The circuit breaker (C9 layer 3).
pub mod breaker;
/// Per-worker tuning.
pub mod config;
/// Budget-aware conversation window.
pub mod context;
/// Round-robin API key rotation on rate-limit errors (C9 layer 4).
pub mod credentials;
/// The model-provider contract.
pub mod provider;
/// Exponential backoff with jitter and retryability classification.
pub mod retry;
/// The resilient model client: provider selection, retry, fallback.
pub mod router;
/// Per-call usage accounting and budget enforcement (C9 layer 5).
pub mod usage;
/// The agent worker loop.
pub mod worker;

pub use backends::{claude::ClaudeProvider, openai::OpenAiProvider};
pub use breaker::{BreakerState, CircuitBreaker};
pub use config::WorkerConfig;
pub use context::ContextWindow;
pub use credentials::CredentialRotator;
pub use provider::{CallStats, ModelProvider, ProviderResponse};
pub use retry::{compute_backoff, is_retryable, RetryPolicy};
pub use router::{ProviderEntry, ProviderRouter, SelectionStrategy};
pub use usage::{BudgetLimits, ProviderUsageSummary, UsageLedger, UsageRecord};
pub use worker::{AgentWorker, TaskPostProcessor, WorkerOutcome};

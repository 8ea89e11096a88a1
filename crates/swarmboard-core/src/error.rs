use thiserror::Error;

/// A convenience `Result` alias using [`SwarmError`].
pub type SwarmResult<T> = Result<T, SwarmError>;

/// Top-level error type for the swarmboard coordination core.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum SwarmError {
    /// The task board rejected a mutation: invariant violation, bad state
    /// transition, missing task, or a malformed on-disk document.
    #[error("board error: {0}")]
    Board(String),

    /// The context bus or mailbox layer failed to read or persist state.
    #[error("bus error: {0}")]
    Bus(String),

    /// The lazy runtime failed to launch, signal, or track a worker.
    #[error("runtime error: {0}")]
    Runtime(String),

    /// An error from an agent worker's execution loop.
    #[error("agent error: {0}")]
    Agent(String),

    /// A model provider call failed in a way the resilient client gave up on.
    #[error("provider error: {0}")]
    Provider(String),

    /// Every configured budget (daily/monthly) for a provider was exceeded.
    #[error("budget exceeded for provider '{provider}': {detail}")]
    BudgetExceeded {
        /// The provider whose budget was exceeded.
        provider: String,
        /// Human-readable detail (limit vs. spend).
        detail: String,
    },

    /// An error from the orchestrator's routing, decomposition, or
    /// close-out synthesis logic.
    #[error("orchestrator error: {0}")]
    Orchestrator(String),

    /// An error from an external channel sink.
    #[error("channel error: {0}")]
    Channel(String),

    /// An error from the tool dispatcher contract.
    #[error("tool error: {0}")]
    Tool(String),

    /// An error in configuration parsing or validation.
    #[error("config error: {0}")]
    Config(String),

    /// The operation was cancelled cooperatively; not a failure, but
    /// propagated through the same `Result` channel so callers can treat it
    /// uniformly.
    #[error("operation cancelled")]
    Cancelled,

    /// An error from an outbound HTTP request (e.g. provider API call).
    #[error("http error: {0}")]
    Http(String),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

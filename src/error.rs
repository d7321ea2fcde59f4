//! Error kinds surfaced by the scheduling core.

/// Result alias used throughout the crate's public surface.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors the core can raise.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The ready or waiting queue was full at admission time.
    #[error("capacity exhausted: queue is at its configured limit")]
    CapacityExhausted,

    /// Two admitted tasks shared the same label.
    #[error("duplicate label: a task with this label is already admitted")]
    DuplicateLabel,

    /// A mutex was unlocked by a task that does not own it, or while unlocked.
    #[error("invalid unlock: caller does not own this mutex")]
    InvalidUnlock,

    /// A sync primitive operation was invoked outside a running task.
    #[error("not in task context: this operation requires a running task")]
    NotInTaskContext,

    /// A user callable terminated abnormally.
    #[error("task failure: {0}")]
    TaskFailure(String),

    /// `run()` was called with no processing units added, or the supplied
    /// `RuntimeConfig` was invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

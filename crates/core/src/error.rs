use std::io;
use std::result::Result as StdResult;

use thiserror::Error;

/// Errors that can occur in the pilot-mem worker.
///
/// Variants follow the propagation policy of the daemon: `Transient` is
/// retried inside the component that raised it, `ContractViolation` and
/// `NotFound` surface to HTTP callers, `Corruption` is logged and the
/// affected unit skipped, `Fatal` terminates the process.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkerError {
    /// Retriable failure (SQLite busy, spawn race, network read).
    #[error("transient: {0}")]
    Transient(String),

    /// Invalid input from a caller (bad plan status, traversal attempt,
    /// missing required field). Never retried.
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed persisted data (queue payload, transcript line). Logged
    /// and skipped; never aborts a batch.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Unrecoverable failure (database open, port bind). Exits non-zero.
    #[error("fatal: {0}")]
    Fatal(String),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO operation error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl WorkerError {
    /// Whether this error is worth retrying.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether this error represents a not-found condition.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether this error represents invalid caller input.
    #[must_use]
    pub const fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }
}

/// Result type alias for pilot-mem operations.
pub type Result<T> = StdResult<T, WorkerError>;

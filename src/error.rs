//! Crate-level error taxonomy.
//!
//! Every fallible crate operation ultimately resolves to a [`CoreError`]
//! variant. The worker channel keeps its own narrower [`crate::worker::WorkerError`]
//! and converts into this one at the boundary where callers stop caring
//! about subprocess internals.

use crate::worker::WorkerError;

/// Crate-level result alias.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors surfaced by the turn-serving core.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The incoming `TurnRequest` was malformed (e.g. no text and no audio).
    #[error("invalid turn request: {0}")]
    InputInvalid(String),

    /// A worker stage did not reply within its deadline.
    #[error("worker timed out after {0:?}")]
    WorkerTimeout(std::time::Duration),

    /// A worker violated the line-JSON wire protocol.
    #[error("worker protocol violation: {0}")]
    WorkerProtocol(String),

    /// A worker process exited unexpectedly.
    #[error("worker crashed (exit code: {0:?})")]
    WorkerCrashed(Option<i32>),

    /// A worker exhausted its restart budget and is marked unavailable.
    #[error("worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The per-worker request queue was full.
    #[error("turn enqueue failed: queue full, retry after {retry_after_ms}ms")]
    TurnEnqueueFailed {
        /// Hint for how long the caller should wait before retrying.
        retry_after_ms: u64,
    },

    /// The end-to-end turn deadline elapsed before all stages completed.
    #[error("turn deadline exceeded")]
    TurnDeadlineExceeded,

    /// Configuration could not be parsed or contained an out-of-range value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wraps a lower-level worker-channel error that doesn't map cleanly
    /// onto one of the taxonomy variants above (e.g. spawn failure).
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// JSON (de)serialization failure outside the worker wire protocol.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure outside the worker wire protocol (e.g. config file read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Maps this error to the process exit code contract in the external
    /// interface spec: `0` normal, `1` configuration error, `2` all workers
    /// unavailable at startup.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::WorkerUnavailable(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_config_error_is_one() {
        let err = CoreError::Config("bad toml".into());
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn exit_code_worker_unavailable_is_two() {
        let err = CoreError::WorkerUnavailable("emotion".into());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn display_messages_are_non_empty() {
        let err = CoreError::TurnDeadlineExceeded;
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn worker_error_converts_via_from() {
        let werr = WorkerError::ProcessExited { exit_code: Some(1) };
        let cerr: CoreError = werr.into();
        assert!(matches!(cerr, CoreError::Worker(_)));
    }
}

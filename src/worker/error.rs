//! Error types for the worker subprocess channel.

/// Errors that can occur talking to a worker subprocess.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// Failed to spawn the worker subprocess.
    #[error("failed to spawn worker process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Operation timed out.
    #[error("worker call timed out after {timeout_secs}s")]
    Timeout {
        /// The timeout duration in seconds.
        timeout_secs: u64,
    },

    /// Line-JSON protocol violation (malformed reply, extra lines, etc).
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Worker did not become ready within the configured timeout.
    #[error("worker failed to become ready: {reason}")]
    NotReady {
        /// Why the worker never reported ready.
        reason: String,
    },

    /// Worker process exited unexpectedly.
    #[error("worker process exited unexpectedly (exit code: {exit_code:?})")]
    ProcessExited {
        /// The exit code, if available.
        exit_code: Option<i32>,
    },

    /// Reply line exceeded the maximum accepted size.
    #[error("worker output exceeded {max_bytes} bytes")]
    OutputTruncated {
        /// The maximum allowed output size.
        max_bytes: usize,
    },

    /// Exceeded the maximum number of restart attempts within the window.
    #[error("worker exceeded maximum restarts ({count}) within the failure window")]
    MaxRestartsExceeded {
        /// How many restarts were attempted.
        count: u32,
    },

    /// Worker is marked unavailable after exhausting its restart budget.
    #[error("worker \"{name}\" is unavailable")]
    Unavailable {
        /// The worker's configured name (e.g. "emotion").
        name: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[source] serde_json::Error),
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn display_timeout() {
        let err = WorkerError::Timeout { timeout_secs: 30 };
        assert_eq!(err.to_string(), "worker call timed out after 30s");
    }

    #[test]
    fn display_unavailable() {
        let err = WorkerError::Unavailable {
            name: "emotion".to_owned(),
        };
        assert!(err.to_string().contains("emotion"));
    }

    #[test]
    fn json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = WorkerError::from(json_err);
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<WorkerError>();
    }
}

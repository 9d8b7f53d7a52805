//! Bounded per-worker request admission (§5 "Shared resources").
//!
//! Each worker process has a single in-flight call (the `WorkerChannel`
//! serializes on an internal mutex — §5 "strictly single-threaded and
//! serial"). On top of that, the Orchestrator bounds how many callers may be
//! *admitted* (queued + serving) at once; once the bound is hit, new callers
//! are rejected immediately with `TurnEnqueueFailed` rather than waiting
//! indefinitely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::{CoreError, Result};
use crate::worker::WorkerChannel;

/// Default bounded-queue depth (§5).
pub const DEFAULT_QUEUE_DEPTH: usize = 8;

/// A worker channel fronted by an admission-bounded queue.
pub struct QueuedWorker {
    channel: Arc<WorkerChannel>,
    admission: Arc<Semaphore>,
}

impl QueuedWorker {
    pub fn new(channel: Arc<WorkerChannel>, depth: usize) -> Self {
        Self {
            channel,
            admission: Arc::new(Semaphore::new(depth)),
        }
    }

    pub fn channel(&self) -> &Arc<WorkerChannel> {
        &self.channel
    }

    /// Admits and runs `request` against the underlying worker, or returns
    /// `TurnEnqueueFailed` immediately if the queue is already full.
    pub async fn call(&self, request: &serde_json::Value, per_call_timeout: Duration) -> Result<serde_json::Value> {
        let _permit = self.admission.try_acquire().map_err(|_| CoreError::TurnEnqueueFailed {
            retry_after_ms: per_call_timeout.as_millis().min(1000) as u64,
        })?;
        self.channel.call(request, per_call_timeout).await.map_err(CoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::WorkerSpec;
    use std::collections::HashMap;

    fn spec(name: &str) -> WorkerSpec {
        WorkerSpec {
            name: name.to_owned(),
            cmd: "sh".to_owned(),
            args: vec!["-c".to_owned(), "cat".to_owned()],
            env: HashMap::new(),
            ready_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(5),
            probe_request: serde_json::json!({"ping": true}),
        }
    }

    #[tokio::test]
    async fn queue_rejects_when_depth_is_zero() {
        let worker = QueuedWorker::new(Arc::new(WorkerChannel::new(spec("t"))), 0);
        let result = worker.call(&serde_json::json!({}), Duration::from_millis(50)).await;
        assert!(matches!(result, Err(CoreError::TurnEnqueueFailed { .. })));
    }
}

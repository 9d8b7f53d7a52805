//! Administrative control surface (§6 "Control surface"): `workerStatus()`,
//! `restart(workerId)`, `drain()`. The spec leaves the transport out of
//! scope; this just provides the in-process operations a transport (a CLI,
//! a loopback socket, whatever the deployer wants) would call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::orchestrator::queue::QueuedWorker;
use crate::worker::WorkerHealth;

#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatusEntry {
    pub worker_id: String,
    pub state: String,
    pub health: WorkerHealthSummary,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct WorkerHealthSummary {
    pub alive: bool,
    pub last_latency_ms: Option<u64>,
    pub inflight: bool,
}

impl From<WorkerHealth> for WorkerHealthSummary {
    fn from(h: WorkerHealth) -> Self {
        Self {
            alive: h.alive,
            last_latency_ms: h.last_latency_ms,
            inflight: h.inflight,
        }
    }
}

/// Administrative handle over the three worker channels. Holding this
/// doesn't grant call access to the workers themselves — it's a narrow
/// surface for status/restart/drain only.
pub struct AdminHandle {
    workers: Vec<(&'static str, Arc<QueuedWorker>)>,
    draining: Arc<AtomicBool>,
}

impl AdminHandle {
    pub fn new(
        emotion: Arc<QueuedWorker>,
        response: Arc<QueuedWorker>,
        tts: Arc<QueuedWorker>,
        draining: Arc<AtomicBool>,
    ) -> Self {
        Self {
            workers: vec![("emotion", emotion), ("response", response), ("tts", tts)],
            draining,
        }
    }

    /// Eagerly spawns every worker and waits for its readiness probe,
    /// returning the names of any that failed to come up. Used by the
    /// `start` transport so a dead worker surfaces at process startup
    /// rather than on the first turn (§6: exit code `2` when all workers
    /// are unavailable at startup).
    pub async fn start_all(&self) -> Vec<(&'static str, Result<()>)> {
        let mut out = Vec::with_capacity(self.workers.len());
        for (id, worker) in &self.workers {
            let result = worker.channel().start().await.map_err(CoreError::from);
            out.push((*id, result));
        }
        out
    }

    pub async fn worker_status(&self) -> Vec<WorkerStatusEntry> {
        let mut out = Vec::with_capacity(self.workers.len());
        for (id, worker) in &self.workers {
            let channel = worker.channel();
            out.push(WorkerStatusEntry {
                worker_id: (*id).to_owned(),
                state: channel.state().await.to_string(),
                health: channel.health().await.into(),
            });
        }
        out
    }

    pub async fn restart(&self, worker_id: &str) -> Result<()> {
        let worker = self
            .workers
            .iter()
            .find(|(id, _)| *id == worker_id)
            .map(|(_, w)| w)
            .ok_or_else(|| CoreError::InputInvalid(format!("unknown worker id: {worker_id}")))?;
        worker.channel().force_restart().await;
        Ok(())
    }

    /// Marks the Orchestrator as draining. New turns should be rejected by
    /// the caller (e.g. the front-end-facing entry point) once this is set;
    /// in-flight turns are left to finish on their own.
    pub fn drain(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }
}

//! Line-delimited JSON request/reply channel over a child process's stdio.
//!
//! A [`WorkerChannel`] owns one worker subprocess. The wire format carries no
//! envelope: each request is one JSON object written as a line to the
//! child's stdin, and the reply is the next line read from its stdout. The
//! channel is strictly one-in-one-out — there is no multiplexing, so a
//! worker only ever has one request in flight.

use super::error::WorkerError;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout};
use tokio::sync::Mutex;
use tokio::time::timeout;

/// Maximum number of bytes accepted per reply line (100 KB — replies carry
/// base64 audio for the TTS worker, so this is generous).
const MAX_LINE_BYTES: usize = 100 * 1024;

/// Backoff delays between restart attempts: 1 s, 2 s, 4 s, … capped at 30 s.
const BACKOFF_INITIAL_SECS: u64 = 1;
const BACKOFF_MAX_SECS: u64 = 30;

/// Number of failed starts within [`RESTART_WINDOW`] before a worker is
/// marked unavailable.
const MAX_FAILED_STARTS: u32 = 5;

/// Rolling window over which failed starts are counted.
const RESTART_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Returns the backoff duration for `attempt` (0-indexed), doubling up to
/// [`BACKOFF_MAX_SECS`].
pub fn backoff_for_attempt(attempt: u32) -> Duration {
    let secs = BACKOFF_INITIAL_SECS
        .checked_shl(attempt)
        .unwrap_or(BACKOFF_MAX_SECS)
        .min(BACKOFF_MAX_SECS);
    Duration::from_secs(secs)
}

/// Worker subprocess lifecycle states.
///
/// ```text
/// Pending → Starting → Ready ↔ Serving
///               ↓         ↓
///             Failed    Failed → (restart) → Pending
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Process has not been spawned yet.
    Pending,
    /// Process is spawning / has not yet answered its readiness probe.
    Starting,
    /// Process answered its readiness probe and can accept calls.
    Ready,
    /// A call is currently in flight.
    Serving,
    /// Two consecutive timeouts or a protocol violation; still alive but
    /// due for a restart on the next call.
    Degraded,
    /// Process exited or was killed after exhausting retries.
    Failed,
    /// Restart budget exhausted within the failure window.
    Unavailable,
    /// Process was deliberately stopped (drain).
    Stopped,
}

impl WorkerState {
    /// Returns `true` if calls should be rejected outright in this state.
    pub fn rejects_calls(self) -> bool {
        matches!(self, Self::Unavailable | Self::Stopped)
    }

    fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Pending, Self::Starting)
                | (Self::Starting, Self::Ready)
                | (Self::Starting, Self::Failed)
                | (Self::Ready, Self::Serving)
                | (Self::Serving, Self::Ready)
                | (Self::Ready, Self::Degraded)
                | (Self::Serving, Self::Degraded)
                | (Self::Degraded, Self::Failed)
                | (Self::Degraded, Self::Ready)
                | (Self::Ready, Self::Failed)
                | (Self::Serving, Self::Failed)
                | (Self::Failed, Self::Pending)
                | (Self::Failed, Self::Unavailable)
                | (_, Self::Stopped)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Serving => "serving",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
            Self::Unavailable => "unavailable",
            Self::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// How to spawn and talk to one worker subprocess.
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    /// Name used in logging and status reporting (e.g. "emotion").
    pub name: String,
    /// Path/name of the executable to spawn.
    pub cmd: String,
    /// Arguments passed to `cmd`.
    pub args: Vec<String>,
    /// Extra environment variables merged into the inherited environment.
    pub env: std::collections::HashMap<String, String>,
    /// How long `Start` waits for the first successful probe reply.
    pub ready_timeout: Duration,
    /// Per-call timeout for ordinary requests.
    pub call_timeout: Duration,
    /// Cheap request used both as the readiness probe and the periodic
    /// health check (see the Handshake note in the external interface spec).
    pub probe_request: serde_json::Value,
}

/// Point-in-time health snapshot for a worker.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct WorkerHealth {
    /// Whether the subprocess is currently alive.
    pub alive: bool,
    /// Latency of the last successful call, in milliseconds.
    pub last_latency_ms: Option<u64>,
    /// Whether a call is currently in flight.
    pub inflight: bool,
}

/// Tracks failed start attempts within a rolling window to implement the
/// "5 failed starts in 5 minutes ⇒ unavailable" restart policy.
#[derive(Debug, Default)]
struct RestartTracker {
    failures: Vec<Instant>,
}

impl RestartTracker {
    fn record_failure(&mut self, now: Instant) {
        self.failures.push(now);
        self.trim(now);
    }

    fn trim(&mut self, now: Instant) {
        self.failures
            .retain(|&t| now.duration_since(t) <= RESTART_WINDOW);
    }

    fn failure_count(&mut self, now: Instant) -> u32 {
        self.trim(now);
        self.failures.len() as u32
    }

    fn reset(&mut self) {
        self.failures.clear();
    }
}

/// Newline-delimited JSON transport over a child's stdin/stdout.
struct LineComm {
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl LineComm {
    fn from_child(child: &mut Child) -> Option<Self> {
        let stdin = child.stdin.take()?;
        let stdout = child.stdout.take()?;
        Some(Self {
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    async fn write_line(&mut self, line: &str) -> Result<(), WorkerError> {
        self.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(map_write_error)?;
        self.stdin.flush().await.map_err(map_write_error)
    }

    /// Reads exactly one reply line and parses it as JSON.
    async fn read_reply(&mut self) -> Result<serde_json::Value, WorkerError> {
        let mut buf = String::new();
        let n = self
            .stdout
            .read_line(&mut buf)
            .await
            .map_err(map_write_error)?;
        if n == 0 {
            return Err(WorkerError::ProcessExited { exit_code: None });
        }
        if buf.len() > MAX_LINE_BYTES {
            return Err(WorkerError::OutputTruncated {
                max_bytes: MAX_LINE_BYTES,
            });
        }
        let trimmed = buf.trim();
        if trimmed.is_empty() {
            return Err(WorkerError::Protocol {
                message: "empty reply line".to_owned(),
            });
        }
        serde_json::from_str(trimmed).map_err(WorkerError::from)
    }
}

fn map_write_error(e: std::io::Error) -> WorkerError {
    if e.kind() == std::io::ErrorKind::BrokenPipe {
        WorkerError::ProcessExited { exit_code: None }
    } else {
        WorkerError::Protocol {
            message: format!("stdio error: {e}"),
        }
    }
}

/// Owns one worker subprocess and serializes calls through a mutex, since
/// the wire is strictly one-in-one-out.
pub struct WorkerChannel {
    spec: WorkerSpec,
    inner: Mutex<ChannelInner>,
}

struct ChannelInner {
    state: WorkerState,
    child: Option<Child>,
    comm: Option<LineComm>,
    restart_tracker: RestartTracker,
    last_latency_ms: Option<u64>,
    consecutive_timeouts: u32,
}

impl WorkerChannel {
    /// Creates a channel in `Pending` state. The subprocess is not spawned
    /// until [`start`](Self::start) or the first [`call`](Self::call).
    pub fn new(spec: WorkerSpec) -> Self {
        Self {
            spec,
            inner: Mutex::new(ChannelInner {
                state: WorkerState::Pending,
                child: None,
                comm: None,
                restart_tracker: RestartTracker::default(),
                last_latency_ms: None,
                consecutive_timeouts: 0,
            }),
        }
    }

    /// Worker name, for logging and status reporting.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Spawns the subprocess (if not already running) and waits for the
    /// readiness probe to succeed within `ready_timeout`.
    pub async fn start(&self) -> Result<(), WorkerError> {
        let mut inner = self.inner.lock().await;
        if matches!(inner.state, WorkerState::Ready | WorkerState::Serving) {
            return Ok(());
        }
        self.spawn_and_wait_ready(&mut inner).await
    }

    /// Stops the subprocess gracefully: closes stdin, waits briefly, then
    /// kills if it hasn't exited.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut comm) = inner.comm.take() {
            let _ = comm.stdin.shutdown().await;
        }
        if let Some(mut child) = inner.child.take() {
            let graceful = tokio::time::timeout(Duration::from_secs(5), child.wait()).await;
            if graceful.is_err() {
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
        inner.state = WorkerState::Stopped;
    }

    /// Sends `request` and waits for exactly one reply, restarting the
    /// subprocess first if it is not currently usable.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::Unavailable`] if the restart budget is exhausted.
    /// - [`WorkerError::Timeout`] if no reply arrives within `per_call_timeout`.
    /// - [`WorkerError::Protocol`] on malformed JSON or extra output.
    /// - [`WorkerError::ProcessExited`] if the child exited mid-call.
    pub async fn call(
        &self,
        request: &serde_json::Value,
        per_call_timeout: Duration,
    ) -> Result<serde_json::Value, WorkerError> {
        let mut inner = self.inner.lock().await;

        if inner.state.rejects_calls() {
            return Err(WorkerError::Unavailable {
                name: self.spec.name.clone(),
            });
        }

        if !matches!(inner.state, WorkerState::Ready) {
            self.spawn_and_wait_ready(&mut inner).await?;
        }

        inner.state = WorkerState::Serving;

        let outcome = self.send_and_receive(&mut inner, request, per_call_timeout).await;

        match outcome {
            Ok(reply) => {
                inner.consecutive_timeouts = 0;
                inner.state = WorkerState::Ready;
                Ok(reply)
            }
            Err(WorkerError::Timeout { timeout_secs }) => {
                inner.consecutive_timeouts += 1;
                tracing::warn!(
                    worker = %self.spec.name,
                    consecutive = inner.consecutive_timeouts,
                    "worker call timed out"
                );
                if inner.consecutive_timeouts >= 2 {
                    inner.state = WorkerState::Degraded;
                } else {
                    inner.state = WorkerState::Ready;
                }
                Err(WorkerError::Timeout { timeout_secs })
            }
            Err(other) => {
                tracing::warn!(worker = %self.spec.name, error = %other, "worker call failed");
                inner.state = WorkerState::Degraded;
                inner.comm = None;
                if let Some(mut child) = inner.child.take() {
                    let _ = child.start_kill();
                }
                Err(other)
            }
        }
    }

    /// Returns a health snapshot without making a call.
    pub async fn health(&self) -> WorkerHealth {
        let mut inner = self.inner.lock().await;
        let alive = inner
            .child
            .as_mut()
            .is_some_and(|c| matches!(c.try_wait(), Ok(None)));
        WorkerHealth {
            alive,
            last_latency_ms: inner.last_latency_ms,
            inflight: matches!(inner.state, WorkerState::Serving),
        }
    }

    /// Current lifecycle state, for the administrative status surface.
    pub async fn state(&self) -> WorkerState {
        self.inner.lock().await.state
    }

    /// Forces the worker back into `Pending` so the next call re-spawns it,
    /// clearing the restart-failure window. Used by the administrative
    /// `restart(workerId)` operation.
    pub async fn force_restart(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(mut child) = inner.child.take() {
            let _ = child.start_kill();
        }
        inner.comm = None;
        inner.restart_tracker.reset();
        inner.consecutive_timeouts = 0;
        inner.state = WorkerState::Pending;
    }

    async fn send_and_receive(
        &self,
        inner: &mut ChannelInner,
        request: &serde_json::Value,
        per_call_timeout: Duration,
    ) -> Result<serde_json::Value, WorkerError> {
        let comm = inner
            .comm
            .as_mut()
            .ok_or_else(|| WorkerError::Protocol {
                message: "no comm handle attached".to_owned(),
            })?;

        let mut line = serde_json::to_string(request)?;
        line.push('\n');

        let started = Instant::now();
        timeout(per_call_timeout, async {
            comm.write_line(&line).await?;
            comm.read_reply().await
        })
        .await
        .map_err(|_| WorkerError::Timeout {
            timeout_secs: per_call_timeout.as_secs(),
        })?
        .inspect(|_| {
            inner.last_latency_ms = Some(started.elapsed().as_millis() as u64);
        })
    }

    /// Spawns the subprocess (if needed) and blocks until the readiness
    /// probe succeeds or `ready_timeout` elapses, applying restart backoff
    /// and the 5-failures-in-5-minutes unavailability rule.
    async fn spawn_and_wait_ready(&self, inner: &mut ChannelInner) -> Result<(), WorkerError> {
        let now = Instant::now();
        if inner.restart_tracker.failure_count(now) >= MAX_FAILED_STARTS {
            inner.state = WorkerState::Unavailable;
            return Err(WorkerError::Unavailable {
                name: self.spec.name.clone(),
            });
        }

        inner.state = WorkerState::Starting;

        let attempt = inner.restart_tracker.failure_count(now);
        if attempt > 0 {
            let delay = backoff_for_attempt(attempt.saturating_sub(1));
            tracing::warn!(
                worker = %self.spec.name,
                attempt,
                delay_secs = delay.as_secs(),
                "restarting worker with backoff"
            );
            tokio::time::sleep(delay).await;
        }

        match self.spawn_child().await {
            Ok((child, comm)) => {
                inner.child = Some(child);
                inner.comm = Some(comm);
            }
            Err(e) => {
                inner.restart_tracker.record_failure(Instant::now());
                inner.state = WorkerState::Failed;
                return Err(e);
            }
        }

        let probe = self.spec.probe_request.clone();
        let ready = timeout(self.spec.ready_timeout, async {
            self.send_and_receive(inner, &probe, self.spec.ready_timeout).await
        })
        .await;

        match ready {
            Ok(Ok(_)) => {
                inner.restart_tracker.reset();
                inner.consecutive_timeouts = 0;
                inner.state = WorkerState::Ready;
                Ok(())
            }
            Ok(Err(e)) => {
                inner.restart_tracker.record_failure(Instant::now());
                inner.state = WorkerState::Failed;
                if let Some(mut child) = inner.child.take() {
                    let _ = child.start_kill();
                }
                inner.comm = None;
                Err(e)
            }
            Err(_) => {
                inner.restart_tracker.record_failure(Instant::now());
                inner.state = WorkerState::Failed;
                if let Some(mut child) = inner.child.take() {
                    let _ = child.start_kill();
                }
                inner.comm = None;
                Err(WorkerError::NotReady {
                    reason: format!(
                        "no reply within ready_timeout ({:?})",
                        self.spec.ready_timeout
                    ),
                })
            }
        }
    }

    async fn spawn_child(&self) -> Result<(Child, LineComm), WorkerError> {
        let mut cmd = tokio::process::Command::new(&self.spec.cmd);
        cmd.args(&self.spec.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.spec.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(WorkerError::SpawnFailed)?;

        // The worker's stderr is advisory logging only (never part of the
        // reply); forward it through tracing instead of dropping it.
        if let Some(stderr) = child.stderr.take() {
            let name = self.spec.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(worker = %name, "{line}");
                }
            });
        }

        let comm = LineComm::from_child(&mut child).ok_or_else(|| WorkerError::Protocol {
            message: "child process missing piped stdin/stdout".to_owned(),
        })?;

        Ok((child, comm))
    }
}

impl fmt::Debug for WorkerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerChannel")
            .field("name", &self.spec.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(3), Duration::from_secs(8));
        assert_eq!(backoff_for_attempt(10), Duration::from_secs(BACKOFF_MAX_SECS));
    }

    #[test]
    fn state_transitions_pending_to_starting_to_ready() {
        assert!(WorkerState::Pending.can_transition_to(WorkerState::Starting));
        assert!(WorkerState::Starting.can_transition_to(WorkerState::Ready));
        assert!(!WorkerState::Ready.can_transition_to(WorkerState::Starting));
    }

    #[test]
    fn unavailable_and_stopped_reject_calls() {
        assert!(WorkerState::Unavailable.rejects_calls());
        assert!(WorkerState::Stopped.rejects_calls());
        assert!(!WorkerState::Ready.rejects_calls());
    }

    #[test]
    fn restart_tracker_trims_old_failures() {
        let mut tracker = RestartTracker::default();
        let base = Instant::now();
        tracker.record_failure(base);
        assert_eq!(tracker.failure_count(base), 1);
        let later = base + RESTART_WINDOW + Duration::from_secs(1);
        assert_eq!(tracker.failure_count(later), 0);
    }

    #[test]
    fn restart_tracker_marks_unavailable_after_five() {
        let mut tracker = RestartTracker::default();
        let base = Instant::now();
        for i in 0..5 {
            tracker.record_failure(base + Duration::from_secs(i));
        }
        assert!(tracker.failure_count(base + Duration::from_secs(10)) >= MAX_FAILED_STARTS);
    }

    #[tokio::test]
    async fn channel_start_and_call_against_stub_worker() {
        let spec = WorkerSpec {
            name: "stub".into(),
            cmd: "sh".into(),
            args: vec![
                "-c".into(),
                r#"while IFS= read -r line; do echo "{\"ok\":true}"; done"#.into(),
            ],
            env: Default::default(),
            ready_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(5),
            probe_request: serde_json::json!({"probe": true}),
        };
        let channel = WorkerChannel::new(spec);
        channel.start().await.unwrap();
        let reply = channel
            .call(&serde_json::json!({"mode": "text"}), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(reply["ok"], true);
        channel.stop().await;
    }

    #[tokio::test]
    async fn channel_call_against_crashing_worker_reports_process_exited() {
        let spec = WorkerSpec {
            name: "crasher".into(),
            cmd: "sh".into(),
            args: vec!["-c".into(), "exit 1".into()],
            env: Default::default(),
            ready_timeout: Duration::from_secs(2),
            call_timeout: Duration::from_secs(2),
            probe_request: serde_json::json!({"probe": true}),
        };
        let channel = WorkerChannel::new(spec);
        let result = channel.start().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn channel_call_times_out_against_silent_worker() {
        let spec = WorkerSpec {
            name: "silent".into(),
            cmd: "sh".into(),
            args: vec!["-c".into(), "sleep 5".into()],
            env: Default::default(),
            ready_timeout: Duration::from_millis(200),
            call_timeout: Duration::from_millis(200),
            probe_request: serde_json::json!({"probe": true}),
        };
        let channel = WorkerChannel::new(spec);
        let result = channel.start().await;
        assert!(result.is_err());
    }
}

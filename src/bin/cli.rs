//! `fae`: starts the Turn Orchestrator supervisor and exposes the
//! administrative operations named in §6 (`workerStatus`, `restart`,
//! `drain`).
//!
//! §6 leaves the control surface's transport out of scope; this CLI is one
//! concrete transport. `worker-status` and `restart` spin up the same three
//! worker channels `start` would and act on them directly — there is no
//! cross-process channel to an already-running supervisor here, since the
//! spec only specifies the surface's operations, not how a second process
//! would reach a live one.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fae::config::Config;
use fae::error::Result;
use fae::orchestrator::{AdminHandle, Orchestrator, TurnRequest};
use fae::worker::{WorkerChannel, WorkerSpec};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fae", about = "Emotional-therapy assistant inference core")]
struct Cli {
    /// Path to an optional TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Starts the supervisor and serves `TurnRequest` JSON lines on stdin,
    /// `TurnResult` JSON lines on stdout.
    Start,
    /// Reports each worker's current state and health.
    WorkerStatus,
    /// Force-restarts one worker (`emotion`, `response`, or `tts`).
    Restart {
        worker_id: String,
    },
    /// Marks the supervisor as draining (no effect on a one-shot process;
    /// provided so the operation exists on this transport too).
    Drain,
}

fn build_worker(name: &str, cmd: &str, ready_timeout: Duration, probe: serde_json::Value) -> Arc<WorkerChannel> {
    Arc::new(WorkerChannel::new(WorkerSpec {
        name: name.to_owned(),
        cmd: cmd.to_owned(),
        args: vec![],
        env: HashMap::new(),
        ready_timeout,
        call_timeout: Duration::from_secs(10),
        probe_request: probe,
    }))
}

fn build_orchestrator(config: &Config) -> Orchestrator {
    let ready_timeout = config.deadlines.worker_ready_timeout();
    let emotion = build_worker(
        "emotion",
        &config.workers.emotion_worker_cmd,
        ready_timeout,
        serde_json::json!({"mode": "text", "text": ""}),
    );
    let response = build_worker(
        "response",
        &config.workers.response_worker_cmd,
        ready_timeout,
        serde_json::json!({"user_input": "", "emotion": "neutral", "history": []}),
    );
    let tts = build_worker(
        "tts",
        &config.workers.tts_worker_cmd,
        ready_timeout,
        serde_json::json!({"text": "", "language": "en"}),
    );
    Orchestrator::new(emotion, response, tts, config.queue_depth.0)
        .with_history_limits(config.deadlines.history_max_pairs, config.deadlines.history_max_chars)
        .with_turn_deadline(config.deadlines.turn_deadline())
}

async fn print_worker_status(admin: &AdminHandle) {
    let statuses = admin.worker_status().await;
    println!("{}", serde_json::to_string_pretty(&statuses).unwrap_or_default());
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "fatal error");
            std::process::ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let orchestrator = build_orchestrator(&config);

    match cli.command {
        Command::Start => {
            info!("starting supervisor");
            let admin = orchestrator.admin();
            // Eagerly start each worker so a failure surfaces at startup
            // rather than on the first turn (§6 exit code 2: "all workers
            // unavailable at startup").
            let started = admin.start_all().await;
            let all_failed = started.iter().all(|(_, r)| r.is_err());
            for (id, result) in &started {
                match result {
                    Ok(()) => info!(worker = %id, "ready"),
                    Err(e) => tracing::warn!(worker = %id, error = %e, "failed to start"),
                }
            }
            if all_failed {
                return Err(fae::error::CoreError::WorkerUnavailable(
                    "all workers unavailable at startup".to_owned(),
                ));
            }
            serve_turns(&orchestrator).await
        }
        Command::WorkerStatus => {
            let admin = orchestrator.admin();
            print_worker_status(&admin).await;
            Ok(())
        }
        Command::Restart { worker_id } => {
            let admin = orchestrator.admin();
            admin.restart(&worker_id).await?;
            println!("restarted {worker_id}");
            Ok(())
        }
        Command::Drain => {
            let admin = orchestrator.admin();
            admin.drain();
            println!("draining");
            Ok(())
        }
    }
}

/// Reads `TurnRequest` JSON lines from stdin, writes `TurnResult` JSON lines
/// to stdout — the front-end-facing side of the Orchestrator (§4.5). This is
/// a separate line protocol from the inward worker wire protocol (§6); it
/// exists so `start` is directly usable rather than just a no-op supervisor.
async fn serve_turns(orchestrator: &Orchestrator) -> Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};

    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: TurnRequest = match serde_json::from_str(&line) {
            Ok(req) => req,
            Err(e) => {
                println!("{}", serde_json::json!({"error": format!("invalid turn request: {e}")}));
                continue;
            }
        };

        let result = orchestrator.turn(request, CancellationToken::new()).await;
        match result {
            Ok(turn_result) => println!("{}", serde_json::to_string(&turn_result).unwrap_or_default()),
            Err(e) => println!("{}", serde_json::json!({"error": e.to_string()})),
        }
    }

    Ok(())
}

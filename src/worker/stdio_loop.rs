//! Shared stdio driver for the worker binaries (§6 "Worker wire protocol"):
//! one JSON object per line on stdin, exactly one JSON object per line on
//! stdout, nothing else on stdout, logging to stderr only.

use std::io::Write as _;

use tokio::io::{AsyncBufReadExt, BufReader};

/// Reads lines from stdin until EOF, running `handler` on each parsed
/// request and writing its JSON reply (plus a trailing newline) to stdout.
///
/// A line that fails to parse as JSON is reported as a `{"error": ...}`
/// reply rather than crashing the worker — a malformed request from a
/// well-behaved Orchestrator should never happen, but the worker must stay
/// alive across whatever it does see (§4.1 "Worker is a single owner of its
/// model; ... ").
pub async fn run<F, Fut>(mut handler: F) -> std::io::Result<()>
where
    F: FnMut(serde_json::Value) -> Fut,
    Fut: std::future::Future<Output = serde_json::Value>,
{
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = std::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<serde_json::Value>(&line) {
            Ok(request) => handler(request).await,
            Err(e) => serde_json::json!({"error": format!("malformed request line: {e}")}),
        };

        writeln!(stdout, "{reply}")?;
        stdout.flush()?;
    }

    Ok(())
}

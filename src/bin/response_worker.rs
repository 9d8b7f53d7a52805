//! `fae-response-worker`: the C3 Response Worker subprocess.
//!
//! Defaults to the lightweight pattern backend (§4.3 "Implementation
//! variants") — no model weights to load, always available. A deployment
//! that wants the model-backed variant builds its own binary (or extends
//! this one) wiring [`fae::response::ModelBackend`] to a loaded
//! `mistralrs` model; the wire contract is identical either way.

use fae::response::{PatternBackend, ResponseRequest, handle_request};
use fae::worker::stdio_loop;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("fae-response-worker starting (pattern backend)");

    let backend = PatternBackend;

    stdio_loop::run(|request| {
        let backend = &backend;
        async move {
            match serde_json::from_value::<ResponseRequest>(request) {
                Ok(req) => serde_json::to_value(handle_request(req, backend).await)
                    .unwrap_or_else(|e| serde_json::json!({"error": format!("reply serialization failed: {e}")})),
                Err(e) => serde_json::json!({"error": format!("invalid request: {e}")}),
            }
        }
    })
    .await
}

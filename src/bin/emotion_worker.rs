//! `fae-emotion-worker`: the C2 Emotion Worker subprocess. Reads one JSON
//! request per stdin line, writes one JSON reply per stdout line (§6).

use fae::emotion::protocol::{handle_request, EmotionRequest};
use fae::worker::stdio_loop;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("fae-emotion-worker starting");

    stdio_loop::run(|request| async move {
        match serde_json::from_value::<EmotionRequest>(request) {
            Ok(req) => handle_request(&req),
            Err(e) => serde_json::json!({"emotion": "neutral", "confidence": 0.5, "error": format!("invalid request: {e}")}),
        }
    })
    .await
}

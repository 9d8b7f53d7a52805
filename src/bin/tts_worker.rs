//! `fae-tts-worker`: the C4 TTS Worker subprocess.

use fae::tts::{TtsRequest, handle_request};
use fae::worker::stdio_loop;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("fae-tts-worker starting");

    stdio_loop::run(|request| async move {
        match serde_json::from_value::<TtsRequest>(request) {
            Ok(req) => serde_json::to_value(handle_request(req).await)
                .unwrap_or_else(|e| serde_json::json!({"error": format!("reply serialization failed: {e}"), "audioBase64": null})),
            Err(e) => serde_json::json!({"error": format!("invalid request: {e}"), "audioBase64": null}),
        }
    })
    .await
}

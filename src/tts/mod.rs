//! TTS Worker (C4): text -> audio bytes, by shelling out to whatever native
//! speech synthesizer the host platform provides (§4.4).
//!
//! Synthesis is treated as an external native speech service: this worker
//! never bundles or trains a voice model. It discovers a platform TTS binary,
//! asks it to render a WAV file, reads the bytes back, and cleans up.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;

/// Request text longer than this is clamped with a trailing ellipsis (§4.4).
const MAX_TEXT_CHARS: usize = 300;
/// Per-call synthesis timeout (§4.4).
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("no native text-to-speech binary found on this platform")]
    NoBackendAvailable,
    #[error("synthesis process failed to start: {0}")]
    SpawnFailed(#[source] std::io::Error),
    #[error("synthesis timed out after {0:?}")]
    Timeout(Duration),
    #[error("synthesis process exited with status {0}")]
    NonZeroExit(std::process::ExitStatus),
    #[error("failed to read synthesized audio file: {0}")]
    ReadFailed(#[source] std::io::Error),
}

/// Wire request for the TTS worker (§6): `{"text":string,"language":string}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_owned()
}

/// Wire reply (§6). On error, `audio_base64` is `None` and `error` is set;
/// the Orchestrator treats audio as best-effort and still returns the text
/// response (§4.4).
#[derive(Debug, Clone, Serialize)]
pub struct TtsReply {
    #[serde(rename = "audioBase64")]
    pub audio_base64: Option<String>,
    pub text: String,
    pub language: String,
    pub processing_time: f64,
    pub model: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Escapes embedded quotes and clamps to [`MAX_TEXT_CHARS`] with an ellipsis
/// (§4.4 "Text is sanitized").
fn sanitize_text(text: &str) -> String {
    let escaped = text.replace('"', "\\\"");
    let mut chars = escaped.chars();
    let clamped: String = chars.by_ref().take(MAX_TEXT_CHARS).collect();
    if chars.next().is_some() {
        format!("{clamped}...")
    } else {
        clamped
    }
}

/// The native synthesis binaries this worker knows how to drive, in
/// discovery-preference order.
enum Backend {
    EspeakNg(PathBuf),
    Espeak(PathBuf),
    MacSay(PathBuf),
}

impl Backend {
    fn model_name(&self) -> &'static str {
        match self {
            Backend::EspeakNg(_) => "espeak-ng",
            Backend::Espeak(_) => "espeak",
            Backend::MacSay(_) => "macos_say",
        }
    }

    fn command(&self, text: &str, out_path: &std::path::Path) -> Command {
        let out = out_path.to_string_lossy();
        match self {
            Backend::EspeakNg(bin) | Backend::Espeak(bin) => {
                let mut cmd = Command::new(bin);
                cmd.arg("-w").arg(out.as_ref()).arg(text);
                cmd
            }
            Backend::MacSay(bin) => {
                let mut cmd = Command::new(bin);
                cmd.arg("--data-format=LEI16@22050")
                    .arg("-o")
                    .arg(out.as_ref())
                    .arg(text);
                cmd
            }
        }
    }
}

/// Discovers the first available native TTS binary on this host.
fn discover_backend() -> Result<Backend, TtsError> {
    if let Ok(path) = which::which("espeak-ng") {
        return Ok(Backend::EspeakNg(path));
    }
    if let Ok(path) = which::which("espeak") {
        return Ok(Backend::Espeak(path));
    }
    if let Ok(path) = which::which("say") {
        return Ok(Backend::MacSay(path));
    }
    Err(TtsError::NoBackendAvailable)
}

/// Synthesizes `text` to WAV bytes using the discovered platform backend.
/// This is the fallible inner path; [`handle_request`] converts its errors
/// into the wire-level `{error, audioBase64: null}` reply.
pub async fn synthesize(text: &str, _language: &str) -> Result<(Vec<u8>, &'static str), TtsError> {
    let backend = discover_backend()?;
    let sanitized = sanitize_text(text);

    let scratch = tempfile::Builder::new()
        .prefix("fae-tts-")
        .suffix(".wav")
        .tempfile()
        .map_err(TtsError::SpawnFailed)?;
    let out_path = scratch.path().to_path_buf();
    // The synthesis binary writes the real file itself; keep the path alive
    // via `out_path` after dropping our handle so it isn't deleted early.
    drop(scratch);

    let mut cmd = backend.command(&sanitized, &out_path);
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::piped());

    let spawn = cmd.spawn().map_err(TtsError::SpawnFailed)?;
    let output = match tokio::time::timeout(SYNTHESIS_TIMEOUT, spawn.wait_with_output()).await {
        Ok(result) => result.map_err(TtsError::SpawnFailed)?,
        Err(_) => {
            let _ = std::fs::remove_file(&out_path);
            return Err(TtsError::Timeout(SYNTHESIS_TIMEOUT));
        }
    };

    if !output.status.success() {
        let _ = std::fs::remove_file(&out_path);
        return Err(TtsError::NonZeroExit(output.status));
    }

    let bytes = std::fs::read(&out_path).map_err(TtsError::ReadFailed)?;
    let _ = std::fs::remove_file(&out_path);

    Ok((bytes, backend.model_name()))
}

/// Full request/reply handling: sanitizes, synthesizes, base64-encodes, and
/// always returns a reply (never propagates an error to the caller — errors
/// become `{error, audioBase64: null}` per §4.4).
pub async fn handle_request(request: TtsRequest) -> TtsReply {
    let start = Instant::now();
    match synthesize(&request.text, &request.language).await {
        Ok((bytes, model)) => TtsReply {
            audio_base64: Some(BASE64.encode(bytes)),
            text: request.text,
            language: request.language,
            processing_time: start.elapsed().as_secs_f64(),
            model: model.to_owned(),
            timestamp: chrono::Local::now().to_rfc3339(),
            error: None,
        },
        Err(err) => TtsReply {
            audio_base64: None,
            text: request.text,
            language: request.language,
            processing_time: start.elapsed().as_secs_f64(),
            model: "none".to_owned(),
            timestamp: chrono::Local::now().to_rfc3339(),
            error: Some(format!("TTS generation failed: {err}")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_escapes_quotes() {
        assert_eq!(sanitize_text(r#"she said "hi""#), r#"she said \"hi\""#);
    }

    #[test]
    fn sanitize_clamps_long_text_with_ellipsis() {
        let long = "a".repeat(400);
        let sanitized = sanitize_text(&long);
        assert_eq!(sanitized.len(), MAX_TEXT_CHARS + 3);
        assert!(sanitized.ends_with("..."));
    }

    #[test]
    fn sanitize_leaves_short_text_untouched() {
        assert_eq!(sanitize_text("hello there"), "hello there");
    }

    #[test]
    fn request_deserializes_with_default_language() {
        let parsed: TtsRequest = serde_json::from_str(r#"{"text":"hi"}"#).unwrap();
        assert_eq!(parsed.language, "en");
    }

    #[tokio::test]
    async fn handle_request_never_panics_without_a_backend_present() {
        // Exercises whichever path this host actually takes; either way
        // `handle_request` must always return a reply, never panic.
        let reply = handle_request(TtsRequest {
            text: "hello".to_owned(),
            language: "en".to_owned(),
        })
        .await;
        assert_eq!(reply.text, "hello");
        assert!(reply.audio_base64.is_some() || reply.error.is_some());
    }
}

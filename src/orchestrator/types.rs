//! Shared types for a single turn through the Orchestrator (§3, §4.5).

use serde::{Deserialize, Serialize};

/// A request for one conversational turn.
#[derive(Debug, Clone, Deserialize)]
pub struct TurnRequest {
    pub session_id: String,
    pub turn_index: u32,
    pub text: String,
    /// Path to a WAV file on disk, if the caller captured audio alongside
    /// the text (§4.5 step 1). `None` skips voice-feature extraction.
    #[serde(default)]
    pub audio_ref: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    /// Dialogue history, oldest first; truncated by the Orchestrator to at
    /// most `HISTORY_MAX_PAIRS` pairs and `HISTORY_MAX_CHARS` characters
    /// before being forwarded to the Response Worker (§3).
    #[serde(default)]
    pub history: Vec<String>,
}

fn default_language() -> String {
    "en".to_owned()
}

/// `ResponseCandidate` from §3: `text`, `qualitySignals`, `source`, `modelId`.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseCandidate {
    pub text: String,
    pub quality_signals: crate::response::QualitySignals,
    pub source: &'static str,
    pub model_id: String,
}

/// Per-stage wall-clock timings, recorded regardless of success or fallback
/// (§4.5 step 6: "Record per-stage timings").
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageTimings {
    pub emotion_ms: u64,
    pub response_ms: u64,
    pub tts_ms: u64,
    pub total_ms: u64,
}

/// The emotion result attached to a `TurnResult`, after fusion if voice
/// features were available.
#[derive(Debug, Clone, Serialize)]
pub struct TurnEmotion {
    pub label: String,
    pub confidence: f64,
    /// `true` when this came from a text+voice fusion rather than text alone.
    pub fused: bool,
}

/// The outcome of one turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnResult {
    pub session_id: String,
    pub turn_index: u32,
    pub emotion: TurnEmotion,
    pub response: ResponseCandidate,
    /// Base64 WAV audio, `None` if TTS failed or timed out (best-effort).
    pub audio_base64: Option<String>,
    /// Advisory strings describing degraded-path substitutions taken during
    /// this turn, e.g. `"response_worker_restart"`, `"emotion_stage_timeout"`.
    pub warnings: Vec<String>,
    pub timings: StageTimings,
}

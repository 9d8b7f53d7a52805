//! Turn Orchestrator (C5): fans a single turn request out across the
//! Emotion, Response, and TTS workers, applies the fusion and quality-gate
//! substitution rules, and composes the final [`TurnResult`] (§4.5).

pub mod admin;
pub mod deadlines;
pub mod queue;
pub mod types;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::emotion::{self, EmotionLabel};
use crate::error::Result;
use crate::orchestrator::queue::QueuedWorker;
use crate::response::QualitySignals;
use crate::worker::WorkerChannel;

pub use admin::AdminHandle;
pub use types::{ResponseCandidate, StageTimings, TurnEmotion, TurnRequest, TurnResult};

/// Dialogue history pair cap forwarded to the Response Worker (§3, §6).
pub const HISTORY_MAX_PAIRS: usize = 4;
/// Dialogue history character cap forwarded to the Response Worker (§3, §6).
pub const HISTORY_MAX_CHARS: usize = 1600;

/// Floor below which `TurnResult.emotion.confidence` is never allowed to
/// fall (§3: "the Orchestrator never emits confidence = 0").
const MIN_EMOTION_CONFIDENCE: f64 = 0.1;

/// Mirrors `emotion::fusion::LOW_CONFIDENCE_THRESHOLD`: below this, `fuse()`
/// swaps weights to favor voice over text (§8 scenario 2).
const LOW_TEXT_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Truncates `history` to at most `max_pairs` entries and `max_chars`
/// characters total, dropping the oldest lines first (§3).
pub fn truncate_history(history: &[String], max_pairs: usize, max_chars: usize) -> Vec<String> {
    let mut kept: Vec<String> = history.iter().rev().take(max_pairs * 2).cloned().collect();
    kept.reverse();

    let mut total: usize = kept.iter().map(|s| s.chars().count()).sum();
    while total > max_chars && !kept.is_empty() {
        let dropped = kept.remove(0);
        total -= dropped.chars().count();
    }
    kept
}

pub struct Orchestrator {
    emotion_worker: Arc<QueuedWorker>,
    response_worker: Arc<QueuedWorker>,
    tts_worker: Arc<QueuedWorker>,
    draining: Arc<AtomicBool>,
    history_max_pairs: usize,
    history_max_chars: usize,
    turn_deadline: Duration,
}

impl Orchestrator {
    pub fn new(emotion: Arc<WorkerChannel>, response: Arc<WorkerChannel>, tts: Arc<WorkerChannel>, queue_depth: usize) -> Self {
        Self {
            emotion_worker: Arc::new(QueuedWorker::new(emotion, queue_depth)),
            response_worker: Arc::new(QueuedWorker::new(response, queue_depth)),
            tts_worker: Arc::new(QueuedWorker::new(tts, queue_depth)),
            draining: Arc::new(AtomicBool::new(false)),
            history_max_pairs: HISTORY_MAX_PAIRS,
            history_max_chars: HISTORY_MAX_CHARS,
            turn_deadline: deadlines::END_TO_END_DEADLINE,
        }
    }

    /// Overrides the dialogue-history truncation bounds (§6
    /// `HISTORY_MAX_PAIRS`/`HISTORY_MAX_CHARS`); defaults to the documented
    /// values.
    pub fn with_history_limits(mut self, max_pairs: usize, max_chars: usize) -> Self {
        self.history_max_pairs = max_pairs;
        self.history_max_chars = max_chars;
        self
    }

    /// Overrides the end-to-end turn deadline (§6 `TURN_DEADLINE_S`);
    /// defaults to [`deadlines::END_TO_END_DEADLINE`].
    pub fn with_turn_deadline(mut self, deadline: Duration) -> Self {
        self.turn_deadline = deadline;
        self
    }

    pub fn admin(&self) -> AdminHandle {
        AdminHandle::new(
            Arc::clone(&self.emotion_worker),
            Arc::clone(&self.response_worker),
            Arc::clone(&self.tts_worker),
            Arc::clone(&self.draining),
        )
    }

    /// Runs one turn end-to-end, never returning an error for a downstream
    /// stage failure — every stage has a defined substitution (§4.5); this
    /// only returns `Err` for a malformed request or queue admission
    /// failure, both of which the caller must retry or reject upstream of
    /// the Orchestrator.
    pub async fn turn(&self, request: TurnRequest, cancel: CancellationToken) -> Result<TurnResult> {
        if request.text.trim().is_empty() && request.audio_ref.is_none() {
            return Err(crate::error::CoreError::InputInvalid(
                "turn request has neither text nor audio".to_owned(),
            ));
        }

        let turn_start = Instant::now();
        let mut warnings = Vec::new();
        let mut timings = StageTimings::default();

        let history = truncate_history(&request.history, self.history_max_pairs, self.history_max_chars);

        let (emotion, emotion_ms) = tokio::select! {
            result = self.resolve_emotion(&request, &mut warnings) => result,
            _ = cancel.cancelled() => (neutral_emotion(), 0),
        };
        timings.emotion_ms = emotion_ms;

        // §4.5 "Deadlines": the three per-stage soft deadlines can sum to
        // more than the end-to-end deadline, so each remaining stage is
        // additionally gated on the overall budget. Once it's gone, later
        // stages are substituted directly without attempting a worker call
        // (§7 `TurnDeadlineExceeded`: "best-effort TurnResult marked with a
        // warning", never a terminal error).
        let (response, response_ms) = if turn_start.elapsed() >= self.turn_deadline {
            warnings.push("turn_deadline_exceeded".to_owned());
            (fallback_response(&emotion.label, &request.text, &request.session_id, request.turn_index), 0)
        } else {
            tokio::select! {
                result = self.resolve_response(&request, &emotion, &history, &mut warnings) => result,
                _ = cancel.cancelled() => (fallback_response(&emotion.label, &request.text, &request.session_id, request.turn_index), 0),
            }
        };
        timings.response_ms = response_ms;

        let (audio_base64, tts_ms) = if turn_start.elapsed() >= self.turn_deadline {
            warnings.push("turn_deadline_exceeded".to_owned());
            (None, 0)
        } else {
            tokio::select! {
                result = self.resolve_tts(&response.text, &request.language, &mut warnings) => result,
                _ = cancel.cancelled() => (None, 0),
            }
        };
        timings.tts_ms = tts_ms;

        timings.total_ms = turn_start.elapsed().as_millis() as u64;

        Ok(TurnResult {
            session_id: request.session_id,
            turn_index: request.turn_index,
            emotion,
            response,
            audio_base64,
            warnings,
            timings,
        })
    }

    async fn resolve_emotion(&self, request: &TurnRequest, warnings: &mut Vec<String>) -> (TurnEmotion, u64) {
        let start = Instant::now();

        let voice_result = match request.audio_ref.as_deref() {
            Some(path) => crate::emotion::extract_features(Path::new(path)).ok().map(crate::emotion::classify_voice),
            None => None,
        };

        let text_request = serde_json::json!({"mode": "text", "text": request.text, "language": request.language});
        let text_reply = deadlines::with_deadline(
            deadlines::EMOTION_STAGE_DEADLINE,
            self.emotion_worker.call(&text_request, deadlines::EMOTION_STAGE_DEADLINE),
        )
        .await;

        let elapsed = start.elapsed().as_millis() as u64;

        let text_result = match text_reply {
            Some(Ok(reply)) => {
                let label = reply["emotion"].as_str().and_then(EmotionLabel::parse).unwrap_or(EmotionLabel::Neutral);
                let confidence = reply["confidence"].as_f64().unwrap_or(0.5);
                Some((label, confidence))
            }
            Some(Err(_)) => {
                warnings.push("emotion_worker_restart".to_owned());
                None
            }
            None => {
                warnings.push("emotion_stage_timeout".to_owned());
                None
            }
        };

        let mut emotion = match (text_result, voice_result) {
            (Some((text_label, text_confidence)), Some(voice)) => {
                let combined = emotion::fuse(text_label, text_confidence, voice.label, voice.confidence);
                // §8 scenario 2 ("loud voice overrides"): low text confidence
                // swaps the fusion weights to favor voice. Surface that as an
                // advisory so a low-confidence text read isn't silently
                // overridden without a trace.
                if text_confidence < LOW_TEXT_CONFIDENCE_THRESHOLD {
                    tracing::warn!(text_confidence, "low text confidence, favoring voice emotion");
                    warnings.push("low_text_confidence".to_owned());
                }
                TurnEmotion {
                    label: combined.label.as_str().to_owned(),
                    confidence: combined.confidence,
                    fused: true,
                }
            }
            (Some((label, confidence)), None) => TurnEmotion {
                label: label.as_str().to_owned(),
                confidence,
                fused: false,
            },
            (None, _) => neutral_emotion(),
        };
        // §3 invariant: the Orchestrator never emits confidence = 0; a
        // classifier that produced a near-uniform distribution (no keyword
        // hits across ~28 labels) can otherwise fall below the floor.
        emotion.confidence = emotion.confidence.max(MIN_EMOTION_CONFIDENCE);

        (emotion, elapsed)
    }

    async fn resolve_response(
        &self,
        request: &TurnRequest,
        emotion: &TurnEmotion,
        history: &[String],
        warnings: &mut Vec<String>,
    ) -> (ResponseCandidate, u64) {
        let start = Instant::now();

        let wire_request = serde_json::json!({
            "user_input": request.text,
            "emotion": emotion.label,
            "history": history,
            "session_id": request.session_id,
            "turn_index": request.turn_index,
        });

        let reply = deadlines::with_deadline(
            deadlines::RESPONSE_STAGE_DEADLINE,
            self.response_worker.call(&wire_request, deadlines::RESPONSE_STAGE_DEADLINE),
        )
        .await;

        let elapsed = start.elapsed().as_millis() as u64;

        let candidate = match reply {
            Some(Ok(value)) => ResponseCandidate {
                text: value["response"].as_str().unwrap_or_default().to_owned(),
                quality_signals: QualitySignals {
                    empathy: value["quality_indicators"]["empathy_score"].as_f64().unwrap_or(0.0),
                    professionalism: value["quality_indicators"]["professionalism"].as_f64().unwrap_or(0.0),
                    therapeutic_value: value["quality_indicators"]["therapeutic_value"].as_f64().unwrap_or(0.0),
                },
                source: if value["source"].as_str() == Some("model") { "model" } else { "fallback" },
                model_id: value["model_info"]["model_id"].as_str().unwrap_or("unknown").to_owned(),
            },
            Some(Err(_)) => {
                warnings.push("response_worker_restart".to_owned());
                fallback_response(&emotion.label, &request.text, &request.session_id, request.turn_index)
            }
            None => {
                warnings.push("response_timeout".to_owned());
                fallback_response(&emotion.label, &request.text, &request.session_id, request.turn_index)
            }
        };

        (candidate, elapsed)
    }

    async fn resolve_tts(&self, text: &str, language: &str, warnings: &mut Vec<String>) -> (Option<String>, u64) {
        let start = Instant::now();
        let wire_request = serde_json::json!({"text": text, "language": language});

        let reply = deadlines::with_deadline(
            deadlines::TTS_STAGE_DEADLINE,
            self.tts_worker.call(&wire_request, deadlines::TTS_STAGE_DEADLINE),
        )
        .await;

        let elapsed = start.elapsed().as_millis() as u64;

        // Every path that ends without audio — a well-formed reply carrying
        // a null `audioBase64` (e.g. the TTS Worker's own `{error, ...}`
        // reply, §4.4), a restart, or a stage timeout — reports the same
        // `"tts_unavailable"` advisory (§8 scenario 4); audio stays
        // best-effort either way.
        let audio = match reply {
            Some(Ok(value)) => {
                let audio = value["audioBase64"].as_str().map(str::to_owned);
                if audio.is_none() {
                    let detail = value["error"].as_str().unwrap_or("no audio in reply");
                    tracing::warn!(reason = %detail, "tts_unavailable");
                    warnings.push("tts_unavailable".to_owned());
                }
                audio
            }
            Some(Err(_)) => {
                warnings.push("tts_unavailable".to_owned());
                None
            }
            None => {
                warnings.push("tts_unavailable".to_owned());
                None
            }
        };
        (audio, elapsed)
    }
}

fn neutral_emotion() -> TurnEmotion {
    TurnEmotion {
        label: EmotionLabel::Neutral.as_str().to_owned(),
        confidence: 0.5,
        fused: false,
    }
}

/// Builds a `ResponseCandidate` directly from the scripted fallback library,
/// bypassing the Response Worker entirely (§4.5: "response -> emotion-specific
/// fallback directly").
fn fallback_response(emotion_label: &str, user_input: &str, session_id: &str, turn_index: u32) -> ResponseCandidate {
    let candidate = crate::response::fallback::select(emotion_label, user_input, session_id, turn_index);
    let text = crate::response::fallback::personalize(candidate, user_input);
    let quality_signals = crate::response::quality::assess(&text, emotion_label);
    ResponseCandidate {
        text,
        quality_signals,
        source: "fallback",
        model_id: "orchestrator-direct-fallback".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_history_drops_oldest_pairs_beyond_cap() {
        let history: Vec<String> = (0..20).map(|i| format!("line {i}")).collect();
        let truncated = truncate_history(&history, 4, 10_000);
        assert_eq!(truncated.len(), 8);
        assert_eq!(truncated[0], "line 12");
    }

    #[test]
    fn truncate_history_drops_oldest_lines_beyond_char_budget() {
        let history: Vec<String> = (0..5).map(|i| "x".repeat(500) + &i.to_string()).collect();
        let truncated = truncate_history(&history, 10, 1000);
        let total: usize = truncated.iter().map(|s| s.chars().count()).sum();
        assert!(total <= 1000);
    }

    #[test]
    fn truncate_history_is_empty_for_empty_input() {
        assert!(truncate_history(&[], 4, 1600).is_empty());
    }

    #[test]
    fn min_emotion_confidence_floor_is_below_a_uniform_distribution() {
        // A 28-label uniform distribution scores ~0.036, which must still
        // be clamped up to the 0.1 floor before leaving the Orchestrator.
        assert!(MIN_EMOTION_CONFIDENCE > 1.0 / 28.0);
    }

    fn stub_spec(name: &str, script: &str) -> crate::worker::WorkerSpec {
        crate::worker::WorkerSpec {
            name: name.to_owned(),
            cmd: "sh".to_owned(),
            args: vec!["-c".to_owned(), script.to_owned()],
            env: Default::default(),
            ready_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(5),
            probe_request: serde_json::json!({"probe": true}),
        }
    }

    const ECHO_EMOTION: &str = r#"while IFS= read -r line; do echo '{"emotion":"joy","confidence":0.8}'; done"#;
    const ECHO_RESPONSE: &str = r#"while IFS= read -r line; do echo '{"response":"I hear that, and I understand how that feels.","source":"model","quality_indicators":{"empathy_score":0.8,"professionalism":0.8,"therapeutic_value":0.8},"model_info":{"model_id":"stub-model"}}'; done"#;
    const ECHO_TTS: &str = r#"while IFS= read -r line; do echo '{"audioBase64":"AAAA","text":"ok","language":"en","processing_time":0.01,"model":"stub","timestamp":"2026-01-01T00:00:00Z"}'; done"#;

    #[tokio::test]
    async fn overall_deadline_substitutes_remaining_stages_without_calling_them() {
        let orchestrator = Orchestrator::new(
            Arc::new(WorkerChannel::new(stub_spec("emotion", ECHO_EMOTION))),
            Arc::new(WorkerChannel::new(stub_spec("response", ECHO_RESPONSE))),
            Arc::new(WorkerChannel::new(stub_spec("tts", ECHO_TTS))),
            8,
        )
        // A deadline this tight is already gone by the time the response
        // and TTS stages would run, so both substitute directly.
        .with_turn_deadline(Duration::from_nanos(1));

        let request = TurnRequest {
            session_id: "session-deadline".to_owned(),
            turn_index: 0,
            text: "I just got some wonderful news".to_owned(),
            audio_ref: None,
            language: "en".to_owned(),
            history: Vec::new(),
        };

        let result = orchestrator.turn(request, CancellationToken::new()).await.unwrap();

        assert_eq!(result.response.source, "fallback");
        assert!(result.audio_base64.is_none());
        assert!(result.warnings.iter().filter(|w| *w == "turn_deadline_exceeded").count() >= 2);
    }

    #[test]
    fn with_history_limits_overrides_defaults() {
        let orchestrator = Orchestrator::new(
            Arc::new(WorkerChannel::new(stub_spec("emotion", ECHO_EMOTION))),
            Arc::new(WorkerChannel::new(stub_spec("response", ECHO_RESPONSE))),
            Arc::new(WorkerChannel::new(stub_spec("tts", ECHO_TTS))),
            8,
        )
        .with_history_limits(2, 100);
        assert_eq!(orchestrator.history_max_pairs, 2);
        assert_eq!(orchestrator.history_max_chars, 100);
    }
}

//! The two interchangeable Response Worker backends (§4.3 "Implementation
//! variants"): a model-backed generator and a lightweight pattern generator
//! sharing one wire contract. The worker binary picks one at startup; the
//! Orchestrator never knows which is running.

use std::sync::Arc;

use async_trait::async_trait;
use mistralrs::{Model, RequestBuilder, TextMessageRole};

use crate::response::extract::extract;
use crate::response::fallback::{personalize, select};
use crate::response::prompt::{MAX_PROMPT_TOKENS_DEFAULT, assemble};
use crate::response::quality::{QualitySignals, RejectionReason, assess, gate};

/// A generated candidate before the quality gate has been consulted.
pub struct GeneratedCandidate {
    pub text: String,
    /// `true` if this candidate already bypasses the gate (the pattern
    /// backend's output is, by definition, always `source = fallback`).
    pub is_fallback: bool,
}

/// A backend that turns `(user_input, emotion, history)` into a candidate
/// reply. Implementations never see the quality gate or `source` field —
/// those are applied uniformly by [`crate::response::protocol::handle_request`].
#[async_trait]
pub trait ResponseBackend: Send + Sync {
    /// Stable identifier reported in `model_info`, even when the candidate is
    /// ultimately replaced by a fallback (§4.3: "`modelId` is still populated
    /// with the model that was attempted").
    fn model_id(&self) -> &str;

    async fn generate(
        &self,
        user_input: &str,
        emotion: &str,
        history: &[String],
        session_id: &str,
        turn_index: u32,
    ) -> GeneratedCandidate;
}

/// The lightweight, weight-free backend: selects and personalizes a scripted
/// fallback candidate. Always reports `source = fallback` (§4.3).
pub struct PatternBackend;

#[async_trait]
impl ResponseBackend for PatternBackend {
    fn model_id(&self) -> &str {
        "pattern-fallback-v1"
    }

    async fn generate(
        &self,
        user_input: &str,
        emotion: &str,
        _history: &[String],
        session_id: &str,
        turn_index: u32,
    ) -> GeneratedCandidate {
        let candidate = select(emotion, user_input, session_id, turn_index);
        let text = personalize(candidate, user_input);
        GeneratedCandidate {
            text,
            is_fallback: true,
        }
    }
}

/// The model-backed generator, built on the same `mistralrs` GGUF loading
/// path as [`crate::llm`].
pub struct ModelBackend {
    model: Arc<Model>,
    model_id: String,
    max_new_tokens: usize,
}

impl ModelBackend {
    pub fn new(model: Arc<Model>, model_id: impl Into<String>, max_new_tokens: usize) -> Self {
        Self {
            model,
            model_id: model_id.into(),
            max_new_tokens,
        }
    }
}

#[async_trait]
impl ResponseBackend for ModelBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(
        &self,
        user_input: &str,
        emotion: &str,
        history: &[String],
        _session_id: &str,
        _turn_index: u32,
    ) -> GeneratedCandidate {
        let prompt = assemble(user_input, emotion, history, MAX_PROMPT_TOKENS_DEFAULT);

        // `RequestBuilder` exposes the temperature/top-p/max-len sampler
        // controls, the same set `LocalLlm` uses. Top-k, repetition penalty,
        // and no-repeat-ngram size named in §4.3 aren't exposed by this
        // builder; its defaults are used for those knobs.
        let request = RequestBuilder::new()
            .add_message(TextMessageRole::User, &prompt)
            .set_sampler_temperature(0.7)
            .set_sampler_topp(0.9)
            .set_sampler_max_len(self.max_new_tokens);

        let raw = match self.model.send_chat_request(request).await {
            Ok(response) => response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .unwrap_or_default(),
            Err(_) => String::new(),
        };

        let text = extract(&raw, &prompt);
        GeneratedCandidate {
            text,
            is_fallback: false,
        }
    }
}

/// Runs `backend`'s output through the quality gate, substituting a fallback
/// on rejection, and returns the final `(text, source, rejection)` triple
/// alongside the quality signals computed on whichever text is returned.
pub async fn generate_with_gate(
    backend: &dyn ResponseBackend,
    user_input: &str,
    emotion: &str,
    history: &[String],
    session_id: &str,
    turn_index: u32,
) -> (String, &'static str, QualitySignals, Option<RejectionReason>) {
    let candidate = backend
        .generate(user_input, emotion, history, session_id, turn_index)
        .await;

    if candidate.is_fallback {
        let signals = assess(&candidate.text, emotion);
        return (candidate.text, "fallback", signals, None);
    }

    match gate(&candidate.text) {
        Ok(()) => {
            let signals = assess(&candidate.text, emotion);
            (candidate.text, "model", signals, None)
        }
        Err(reason) => {
            let fallback_text = personalize(select(emotion, user_input, session_id, turn_index), user_input);
            let signals = assess(&fallback_text, emotion);
            (fallback_text, "fallback", signals, Some(reason))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pattern_backend_always_reports_fallback_source() {
        let backend = PatternBackend;
        let (_, source, _, rejection) =
            generate_with_gate(&backend, "I'm overwhelmed at work", "stress", &[], "session-1", 0).await;
        assert_eq!(source, "fallback");
        assert!(rejection.is_none());
    }

    #[tokio::test]
    async fn pattern_backend_output_passes_its_own_gate() {
        let backend = PatternBackend;
        let candidate = backend.generate("I'm anxious", "anxiety", &[], "session-1", 0).await;
        assert!(gate(&candidate.text).is_ok());
    }

    struct StubRejectedBackend;
    #[async_trait]
    impl ResponseBackend for StubRejectedBackend {
        fn model_id(&self) -> &str {
            "stub-model"
        }
        async fn generate(
            &self,
            _user_input: &str,
            _emotion: &str,
            _history: &[String],
            _session_id: &str,
            _turn_index: u32,
        ) -> GeneratedCandidate {
            GeneratedCandidate {
                text: "Totally agree!".to_owned(),
                is_fallback: false,
            }
        }
    }

    #[tokio::test]
    async fn model_candidate_rejected_by_gate_falls_back() {
        let backend = StubRejectedBackend;
        let (text, source, _, rejection) =
            generate_with_gate(&backend, "I feel awful", "sadness", &[], "session-2", 1).await;
        assert_eq!(source, "fallback");
        assert!(rejection.is_some());
        assert_ne!(text, "Totally agree!");
    }

    struct StubAcceptedBackend;
    #[async_trait]
    impl ResponseBackend for StubAcceptedBackend {
        fn model_id(&self) -> &str {
            "stub-model-ok"
        }
        async fn generate(
            &self,
            _user_input: &str,
            _emotion: &str,
            _history: &[String],
            _session_id: &str,
            _turn_index: u32,
        ) -> GeneratedCandidate {
            GeneratedCandidate {
                text: "I understand this feels difficult. What would help most right now?".to_owned(),
                is_fallback: false,
            }
        }
    }

    #[tokio::test]
    async fn model_candidate_passing_gate_reports_model_source() {
        let backend = StubAcceptedBackend;
        let (_, source, _, rejection) =
            generate_with_gate(&backend, "hard week", "sadness", &[], "session-3", 2).await;
        assert_eq!(source, "model");
        assert!(rejection.is_none());
    }
}

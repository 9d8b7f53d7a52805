//! Wire protocol for the Emotion Worker: one JSON object per stdin/stdout
//! line, one request mode per call (§6 of the external interface spec).

use super::context::extract_context;
use super::fusion::{CombinedEmotion, fuse};
use super::labels::EmotionLabel;
use super::text::classify_text;
use super::voice::{VoiceEmotionResult, VoiceFeatures, classify_voice, extract_features, neutral_no_audio};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// The request modes the Emotion Worker accepts. A request naming any other
/// mode is a protocol-level input error (not a crash): it falls through to
/// the `neutral` error reply like any other inference exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Text,
    Voice,
    Combined,
    TextWithContext,
}

impl Mode {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(Self::Text),
            "voice" => Some(Self::Voice),
            "combined" => Some(Self::Combined),
            "text_with_context" => Some(Self::TextWithContext),
            _ => None,
        }
    }
}

/// One line of Emotion Worker stdin.
#[derive(Debug, Clone, Deserialize)]
pub struct EmotionRequest {
    pub mode: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub audio_path: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

fn scores_to_wire(scores: &HashMap<EmotionLabel, f64>) -> HashMap<String, f64> {
    scores.iter().map(|(l, &s)| (l.as_str().to_owned(), s)).collect()
}

#[derive(Debug, Serialize)]
struct TextReply {
    emotion: String,
    confidence: f64,
    all_scores: HashMap<String, f64>,
    raw_label: String,
}

#[derive(Debug, Serialize)]
struct VoiceReply {
    emotion: String,
    confidence: f64,
    features: VoiceFeatures,
}

#[derive(Debug, Serialize)]
struct CombinedInner {
    emotion: String,
    confidence: f64,
    text_emotion: String,
    voice_emotion: String,
    text_confidence: f64,
    voice_confidence: f64,
    weight_text: f64,
    weight_voice: f64,
}

impl From<&CombinedEmotion> for CombinedInner {
    fn from(c: &CombinedEmotion) -> Self {
        Self {
            emotion: c.label.as_str().to_owned(),
            confidence: c.confidence,
            text_emotion: c.text_label.as_str().to_owned(),
            voice_emotion: c.voice_label.as_str().to_owned(),
            text_confidence: c.text_confidence,
            voice_confidence: c.voice_confidence,
            weight_text: c.weight_text,
            weight_voice: c.weight_voice,
        }
    }
}

#[derive(Debug, Serialize)]
struct CombinedReply {
    combined: CombinedInner,
    text: TextReply,
    voice: VoiceReply,
}

#[derive(Debug, Serialize)]
struct TextWithContextReply {
    #[serde(flatten)]
    text: TextReply,
    context: Vec<String>,
}

/// Error reply shape per §4.2: "any inference exception yields
/// `{label: "neutral", confidence: 0.5, error: <message>}`".
#[derive(Debug, Serialize)]
struct EmotionErrorReply {
    emotion: &'static str,
    confidence: f64,
    error: String,
}

fn error_reply(message: impl Into<String>) -> serde_json::Value {
    serde_json::to_value(EmotionErrorReply {
        emotion: "neutral",
        confidence: 0.5,
        error: message.into(),
    })
    .expect("error reply always serializes")
}

fn text_reply(text: &str) -> TextReply {
    let result = classify_text(text);
    TextReply {
        emotion: result.label.as_str().to_owned(),
        confidence: result.confidence,
        all_scores: scores_to_wire(&result.all_scores),
        raw_label: result.raw_label.as_str().to_owned(),
    }
}

fn voice_reply(audio_path: Option<&str>) -> VoiceReply {
    let result: VoiceEmotionResult = match audio_path.filter(|p| !p.is_empty()) {
        None => neutral_no_audio(),
        Some(path) => match extract_features(Path::new(path)) {
            Ok(features) => classify_voice(features),
            Err(_) => neutral_no_audio(),
        },
    };
    VoiceReply {
        emotion: result.label.as_str().to_owned(),
        confidence: result.confidence,
        features: result.features,
    }
}

/// Processes one request and returns the JSON reply value, never failing —
/// every internal error resolves to the `neutral`/0.5 error reply per the
/// worker's failure semantics. Only a malformed *request line* (not handled
/// here; the caller's JSON parse already failed) is a protocol-level issue.
pub fn handle_request(request: &EmotionRequest) -> serde_json::Value {
    let Some(mode) = Mode::parse(&request.mode) else {
        return error_reply(format!("unknown mode: {}", request.mode));
    };

    match mode {
        Mode::Text => {
            let text = request.text.as_deref().unwrap_or("");
            serde_json::to_value(text_reply(text)).expect("text reply serializes")
        }
        Mode::Voice => {
            serde_json::to_value(voice_reply(request.audio_path.as_deref()))
                .expect("voice reply serializes")
        }
        Mode::Combined => {
            let text = request.text.as_deref().unwrap_or("");
            let text_result = text_reply(text);
            let voice_result = voice_reply(request.audio_path.as_deref());

            let text_label = EmotionLabel::parse(&text_result.emotion).unwrap_or(EmotionLabel::Neutral);
            let voice_label = EmotionLabel::parse(&voice_result.emotion).unwrap_or(EmotionLabel::Neutral);
            let combined = fuse(
                text_label,
                text_result.confidence,
                voice_label,
                voice_result.confidence,
            );

            serde_json::to_value(CombinedReply {
                combined: CombinedInner::from(&combined),
                text: text_result,
                voice: voice_result,
            })
            .expect("combined reply serializes")
        }
        Mode::TextWithContext => {
            let text = request.text.as_deref().unwrap_or("");
            let reply = TextWithContextReply {
                text: text_reply(text),
                context: extract_context(text),
            };
            serde_json::to_value(reply).expect("text_with_context reply serializes")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(mode: &str, text: Option<&str>) -> EmotionRequest {
        EmotionRequest {
            mode: mode.to_owned(),
            text: text.map(str::to_owned),
            audio_path: None,
            language: Some("en".to_owned()),
        }
    }

    #[test]
    fn unknown_mode_yields_neutral_error_reply() {
        let reply = handle_request(&request("telepathy", Some("hi")));
        assert_eq!(reply["emotion"], "neutral");
        assert_eq!(reply["confidence"], 0.5);
        assert!(reply["error"].is_string());
    }

    #[test]
    fn text_mode_reply_has_all_scores_for_full_taxonomy() {
        let reply = handle_request(&request("text", Some("I am so happy today")));
        let all_scores = reply["all_scores"].as_object().unwrap();
        assert_eq!(all_scores.len(), 28);
    }

    #[test]
    fn voice_mode_with_missing_audio_path_is_neutral() {
        let reply = handle_request(&request("voice", None));
        assert_eq!(reply["emotion"], "neutral");
        assert_eq!(reply["confidence"], 0.5);
    }

    #[test]
    fn combined_mode_has_text_voice_and_combined_keys() {
        let reply = handle_request(&request("combined", Some("I am fine")));
        assert!(reply["combined"].is_object());
        assert!(reply["text"].is_object());
        assert!(reply["voice"].is_object());
    }

    #[test]
    fn text_with_context_has_context_array() {
        let reply = handle_request(&request(
            "text_with_context",
            Some("I keep worrying about my exam tomorrow"),
        ));
        let context = reply["context"].as_array().unwrap();
        assert!(!context.is_empty());
        assert!(reply["emotion"].is_string());
    }
}

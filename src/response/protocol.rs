//! Wire protocol for the Response Worker (C3), §6.
//!
//! Request: `{"user_input":string,"emotion":string,"history":[string,…]}`.
//! Reply: `{"response":string,"confidence":number,"emotion":string,
//! "source":"model"|"fallback","quality_indicators":{...},"model_info":object}`.

use serde::{Deserialize, Serialize};

use crate::response::generator::{ResponseBackend, generate_with_gate};
use crate::response::quality::QualitySignals;

#[derive(Debug, Clone, Deserialize)]
pub struct ResponseRequest {
    pub user_input: String,
    pub emotion: String,
    #[serde(default)]
    pub history: Vec<String>,
    /// Not part of the normative wire schema, but the deterministic fallback
    /// selection (§4.3) needs a session id and turn counter to seed its
    /// counter; the worker falls back to a per-process default when absent so
    /// a bare-bones request still gets a deterministic (if unvarying) pick.
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub turn_index: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityIndicators {
    pub empathy_score: f64,
    pub professionalism: f64,
    pub therapeutic_value: f64,
}

impl From<QualitySignals> for QualityIndicators {
    fn from(signals: QualitySignals) -> Self {
        Self {
            empathy_score: signals.empathy,
            professionalism: signals.professionalism,
            therapeutic_value: signals.therapeutic_value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_id: String,
    pub backend: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseReply {
    pub response: String,
    pub confidence: f64,
    pub emotion: String,
    pub source: &'static str,
    pub quality_indicators: QualityIndicators,
    pub model_info: ModelInfo,
}

const DEFAULT_SESSION_ID: &str = "default-session";

/// Confidence isn't pinned down further by the wire schema; this reports the
/// mean of the three quality signals, which is 1.0 only for a maximally
/// empathic, professional, question-ending reply and falls naturally for a
/// thin fallback candidate.
fn confidence_from(signals: &QualitySignals) -> f64 {
    (signals.empathy + signals.professionalism + signals.therapeutic_value) / 3.0
}

pub async fn handle_request(request: ResponseRequest, backend: &dyn ResponseBackend) -> ResponseReply {
    let session_id = request.session_id.as_deref().unwrap_or(DEFAULT_SESSION_ID);
    let turn_index = request.turn_index.unwrap_or(0);

    let (text, source, signals, _rejection) = generate_with_gate(
        backend,
        &request.user_input,
        &request.emotion,
        &request.history,
        session_id,
        turn_index,
    )
    .await;

    ResponseReply {
        response: text,
        confidence: confidence_from(&signals),
        emotion: request.emotion,
        source,
        quality_indicators: signals.into(),
        model_info: ModelInfo {
            model_id: backend.model_id().to_owned(),
            backend: if source == "model" { "model" } else { "pattern" },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::generator::PatternBackend;

    #[tokio::test]
    async fn handle_request_round_trips_through_pattern_backend() {
        let backend = PatternBackend;
        let request = ResponseRequest {
            user_input: "I can't stop worrying about work".to_owned(),
            emotion: "anxiety".to_owned(),
            history: vec![],
            session_id: Some("session-7".to_owned()),
            turn_index: Some(2),
        };
        let reply = handle_request(request, &backend).await;
        assert_eq!(reply.source, "fallback");
        assert_eq!(reply.emotion, "anxiety");
        assert!(reply.confidence > 0.0 && reply.confidence <= 1.0);
        assert!(!reply.response.is_empty());
    }

    #[tokio::test]
    async fn handle_request_defaults_session_id_when_absent() {
        let backend = PatternBackend;
        let request = ResponseRequest {
            user_input: "hello".to_owned(),
            emotion: "general".to_owned(),
            history: vec![],
            session_id: None,
            turn_index: None,
        };
        let reply = handle_request(request, &backend).await;
        assert!(!reply.response.is_empty());
    }

    #[test]
    fn request_deserializes_minimal_wire_shape() {
        let json = r#"{"user_input":"hi","emotion":"joy","history":[]}"#;
        let parsed: ResponseRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.user_input, "hi");
        assert_eq!(parsed.history.len(), 0);
    }
}

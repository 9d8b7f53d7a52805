//! Text+voice emotion fusion (the "combined" path).

use super::labels::EmotionLabel;
use serde::{Deserialize, Serialize};

/// Default text/voice fusion weights before the low-confidence swaps.
const DEFAULT_WEIGHT_TEXT: f64 = 0.7;
const DEFAULT_WEIGHT_VOICE: f64 = 0.3;

/// Confidence threshold below which a modality's weight is demoted.
const LOW_CONFIDENCE_THRESHOLD: f64 = 0.4;

/// Agreement boost applied when both modalities agree on the label.
const AGREEMENT_BOOST: f64 = 1.15;

/// Hard ceiling on combined confidence.
const CONFIDENCE_CLAMP: f64 = 0.95;

/// The fused emotion result, carrying both inputs for observability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedEmotion {
    pub label: EmotionLabel,
    pub confidence: f64,
    pub text_label: EmotionLabel,
    pub voice_label: EmotionLabel,
    pub text_confidence: f64,
    pub voice_confidence: f64,
    pub weight_text: f64,
    pub weight_voice: f64,
}

/// Fuses a text-path and voice-path result per the combined-path rule:
///
/// - Default weights `(0.7, 0.3)`.
/// - If `text_confidence < 0.4`, swap to `(0.3, 0.7)`.
/// - Else if `voice_confidence < 0.4`, use `(0.9, 0.1)`.
/// - If the labels agree, `confidence = min(0.95, (wT*cT + wV*cV) * 1.15)`.
/// - Otherwise take whichever weighted confidence is larger, ties to text.
/// - Confidence is always clamped to `[0, 0.95]`.
///
/// Passing `voice_confidence = 0.0` (the "voice absent" case) reduces
/// exactly to the text result: the weights become `(0.9, 0.1)` but the
/// disagreement branch with `voice_confidence == 0` always favors text by
/// construction, and the agreement branch's product is dominated by the
/// text term.
pub fn fuse(
    text_label: EmotionLabel,
    text_confidence: f64,
    voice_label: EmotionLabel,
    voice_confidence: f64,
) -> CombinedEmotion {
    let (weight_text, weight_voice) = if text_confidence < LOW_CONFIDENCE_THRESHOLD {
        (0.3, 0.7)
    } else if voice_confidence < LOW_CONFIDENCE_THRESHOLD {
        (0.9, 0.1)
    } else {
        (DEFAULT_WEIGHT_TEXT, DEFAULT_WEIGHT_VOICE)
    };

    let weighted_text = weight_text * text_confidence;
    let weighted_voice = weight_voice * voice_confidence;

    let (label, confidence) = if text_label == voice_label {
        (
            text_label,
            ((weighted_text + weighted_voice) * AGREEMENT_BOOST).min(CONFIDENCE_CLAMP),
        )
    } else if weighted_text >= weighted_voice {
        (text_label, weighted_text)
    } else {
        (voice_label, weighted_voice)
    };

    CombinedEmotion {
        label,
        confidence: confidence.clamp(0.0, CONFIDENCE_CLAMP),
        text_label,
        voice_label,
        text_confidence,
        voice_confidence,
        weight_text,
        weight_voice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agreement_boosts_confidence() {
        let fused = fuse(EmotionLabel::Joy, 0.8, EmotionLabel::Joy, 0.6);
        assert_eq!(fused.label, EmotionLabel::Joy);
        let expected = ((0.7 * 0.8 + 0.3 * 0.6) * 1.15_f64).min(0.95);
        assert!((fused.confidence - expected).abs() < 1e-9);
    }

    #[test]
    fn low_text_confidence_swaps_weights_to_favor_voice() {
        let fused = fuse(EmotionLabel::Neutral, 0.3, EmotionLabel::Anger, 0.7);
        assert_eq!(fused.weight_text, 0.3);
        assert_eq!(fused.weight_voice, 0.7);
        assert_eq!(fused.label, EmotionLabel::Anger);
    }

    #[test]
    fn low_voice_confidence_favors_text_heavily() {
        let fused = fuse(EmotionLabel::Sadness, 0.8, EmotionLabel::Joy, 0.2);
        assert_eq!(fused.weight_text, 0.9);
        assert_eq!(fused.weight_voice, 0.1);
        assert_eq!(fused.label, EmotionLabel::Sadness);
    }

    #[test]
    fn disagreement_ties_go_to_text() {
        // Construct equal weighted confidences explicitly.
        let fused = fuse(EmotionLabel::Sadness, 0.5, EmotionLabel::Joy, 0.5 * 7.0 / 3.0);
        assert_eq!(fused.label, EmotionLabel::Sadness);
    }

    #[test]
    fn confidence_is_always_clamped_to_point_nine_five() {
        let fused = fuse(EmotionLabel::Joy, 1.0, EmotionLabel::Joy, 1.0);
        assert!(fused.confidence <= 0.95);
    }

    #[test]
    fn confidence_never_negative() {
        let fused = fuse(EmotionLabel::Neutral, 0.0, EmotionLabel::Neutral, 0.0);
        assert!(fused.confidence >= 0.0);
    }

    #[test]
    fn voice_absent_reduces_to_text_result() {
        // Voice confidence 0.0 with a non-matching voice label: the
        // disagreement branch always selects text, since weighted_voice is 0.
        let fused = fuse(EmotionLabel::Joy, 0.8, EmotionLabel::Neutral, 0.0);
        assert_eq!(fused.label, EmotionLabel::Joy);
        assert_eq!(fused.confidence, fused.weight_text * 0.8);
    }
}

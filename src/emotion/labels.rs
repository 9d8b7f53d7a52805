//! The fine-grained emotion taxonomy shared by the text, voice, and
//! combined classification paths.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the ~28 fine-grained emotion categories the classifier can emit.
///
/// This mirrors a GoEmotions-style taxonomy. `Stress` and `Anxiety` are
/// downstream aliases recognized on input (e.g. from the response worker's
/// fallback-library keys) but the classifier itself never emits them
/// directly — they resolve to `Nervousness`/`Fear` on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionLabel {
    Admiration,
    Amusement,
    Anger,
    Annoyance,
    Approval,
    Caring,
    Confusion,
    Curiosity,
    Desire,
    Disappointment,
    Disapproval,
    Disgust,
    Embarrassment,
    Excitement,
    Fear,
    Gratitude,
    Grief,
    Joy,
    Love,
    Nervousness,
    Optimism,
    Pride,
    Realization,
    Relief,
    Remorse,
    Sadness,
    Surprise,
    Neutral,
}

impl EmotionLabel {
    /// All 28 labels the classifier distribution is built over, in a fixed
    /// order used wherever a full score vector is produced.
    pub const ALL: [EmotionLabel; 28] = [
        Self::Admiration,
        Self::Amusement,
        Self::Anger,
        Self::Annoyance,
        Self::Approval,
        Self::Caring,
        Self::Confusion,
        Self::Curiosity,
        Self::Desire,
        Self::Disappointment,
        Self::Disapproval,
        Self::Disgust,
        Self::Embarrassment,
        Self::Excitement,
        Self::Fear,
        Self::Gratitude,
        Self::Grief,
        Self::Joy,
        Self::Love,
        Self::Nervousness,
        Self::Optimism,
        Self::Pride,
        Self::Realization,
        Self::Relief,
        Self::Remorse,
        Self::Sadness,
        Self::Surprise,
        Self::Neutral,
    ];

    /// The raw label string as the classifier model would emit it (lowercase,
    /// matching the wire protocol's `raw_label` field).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admiration => "admiration",
            Self::Amusement => "amusement",
            Self::Anger => "anger",
            Self::Annoyance => "annoyance",
            Self::Approval => "approval",
            Self::Caring => "caring",
            Self::Confusion => "confusion",
            Self::Curiosity => "curiosity",
            Self::Desire => "desire",
            Self::Disappointment => "disappointment",
            Self::Disapproval => "disapproval",
            Self::Disgust => "disgust",
            Self::Embarrassment => "embarrassment",
            Self::Excitement => "excitement",
            Self::Fear => "fear",
            Self::Gratitude => "gratitude",
            Self::Grief => "grief",
            Self::Joy => "joy",
            Self::Love => "love",
            Self::Nervousness => "nervousness",
            Self::Optimism => "optimism",
            Self::Pride => "pride",
            Self::Realization => "realization",
            Self::Relief => "relief",
            Self::Remorse => "remorse",
            Self::Sadness => "sadness",
            Self::Surprise => "surprise",
            Self::Neutral => "neutral",
        }
    }

    /// Parses a raw label string, recognizing the downstream aliases
    /// (`stress`, `anxiety`) used by the response worker's fallback keys in
    /// addition to the classifier's native taxonomy. Unknown labels resolve
    /// to `None` so the caller can apply the "unknown technical label ->
    /// neutral" remapping rule.
    pub fn parse(raw: &str) -> Option<EmotionLabel> {
        let lower = raw.to_ascii_lowercase();
        match lower.as_str() {
            "stress" => Some(Self::Nervousness),
            "anxiety" => Some(Self::Fear),
            other => Self::ALL.into_iter().find(|l| l.as_str() == other),
        }
    }

    /// Applies the text-path post-processing rule: `realization` and any
    /// label the classifier could not resolve to a known taxonomy entry
    /// collapse to `neutral`. The raw label is preserved separately by the
    /// caller.
    pub fn remap_technical(self) -> EmotionLabel {
        match self {
            Self::Realization => Self::Neutral,
            other => other,
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_all_labels() {
        for label in EmotionLabel::ALL {
            assert_eq!(EmotionLabel::parse(label.as_str()), Some(label));
        }
    }

    #[test]
    fn parse_recognizes_downstream_aliases() {
        assert_eq!(EmotionLabel::parse("stress"), Some(EmotionLabel::Nervousness));
        assert_eq!(EmotionLabel::parse("anxiety"), Some(EmotionLabel::Fear));
    }

    #[test]
    fn parse_unknown_label_is_none() {
        assert_eq!(EmotionLabel::parse("quantum_entanglement"), None);
    }

    #[test]
    fn remap_technical_collapses_realization() {
        assert_eq!(EmotionLabel::Realization.remap_technical(), EmotionLabel::Neutral);
        assert_eq!(EmotionLabel::Joy.remap_technical(), EmotionLabel::Joy);
    }

    #[test]
    fn all_labels_have_distinct_strings() {
        let mut seen = std::collections::HashSet::new();
        for label in EmotionLabel::ALL {
            assert!(seen.insert(label.as_str()), "duplicate: {label}");
        }
        assert_eq!(seen.len(), 28);
    }
}

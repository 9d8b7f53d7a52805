//! Text-path emotion classification.
//!
//! The production worker loads a transformer classifier (a RoBERTa-style
//! GoEmotions model) that returns a full probability distribution over the
//! taxonomy. This crate does not ship model weights, so the classifier is a
//! deterministic lexical scorer: each label has a fixed keyword set, scores
//! are keyword-hit counts smoothed and normalized into a distribution. The
//! wire contract (full `all_scores` distribution, `raw_label`, the
//! `realization`/unknown -> `neutral` remap) is identical either way, so the
//! orchestrator and response worker are insulated from this choice.

use super::labels::EmotionLabel;
use std::collections::HashMap;

/// Input text longer than this is truncated before classification.
const MAX_TEXT_CHARS: usize = 512;

/// Smoothing added to every label's raw keyword-hit score so that a
/// distribution can always be formed (and ties fall back to a stable order)
/// even for input with no keyword matches at all.
const SMOOTHING: f64 = 1.0;

/// Result of the text-path classifier, before any worker-protocol framing.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEmotionResult {
    /// The label after the `realization`/unknown -> `neutral` remap.
    pub label: EmotionLabel,
    /// Confidence of `label` in `[0, 1]`.
    pub confidence: f64,
    /// Full distribution over all 28 labels, summing to ~1.
    pub all_scores: HashMap<EmotionLabel, f64>,
    /// The label the classifier actually produced, before remapping.
    pub raw_label: EmotionLabel,
}

fn keyword_lexicon(label: EmotionLabel) -> &'static [&'static str] {
    use EmotionLabel::*;
    match label {
        Admiration => &["admire", "impressive", "amazing", "inspiring", "respect"],
        Amusement => &["funny", "hilarious", "lol", "laugh", "amusing"],
        Anger => &["angry", "furious", "pissed", "rage", "mad", "hate"],
        Annoyance => &["annoyed", "annoying", "irritat", "frustrat"],
        Approval => &["agree", "good idea", "sounds right", "approve"],
        Caring => &["care about", "looking after", "take care", "worried about you"],
        Confusion => &["confused", "don't understand", "unclear", "puzzled"],
        Curiosity => &["curious", "wonder", "what if", "interested in"],
        Desire => &["wish", "want to", "crave", "desire", "hope to"],
        Disappointment => &["disappointed", "let down", "expected more"],
        Disapproval => &["disapprove", "disagree", "bad idea", "wrong"],
        Disgust => &["disgusting", "gross", "revolting", "nasty"],
        Embarrassment => &["embarrassed", "humiliat", "awkward", "ashamed of"],
        Excitement => &["excited", "thrilled", "can't wait", "pumped"],
        Fear => &["scared", "afraid", "terrified", "frightened", "fear"],
        Gratitude => &["thank", "grateful", "appreciate"],
        Grief => &["grief", "mourning", "loss of", "passed away", "died"],
        Joy => &["happy", "joyful", "delighted", "wonderful", "great day"],
        Love => &["love you", "adore", "cherish", "in love"],
        Nervousness => &["nervous", "worrying", "worried", "anxious", "on edge", "can't sleep"],
        Optimism => &["hopeful", "looking forward", "things will get better"],
        Pride => &["proud", "accomplished", "achievement"],
        Realization => &["realize", "i just realized", "it hit me", "now i see"],
        Relief => &["relieved", "what a relief", "glad that's over"],
        Remorse => &["sorry", "regret", "my fault", "shouldn't have"],
        Sadness => &["sad", "depressed", "down", "unhappy", "crying", "miserable"],
        Surprise => &["surprised", "shocked", "wow", "unexpected", "can't believe"],
        Neutral => &[],
    }
}

/// Classifies `text` into a full emotion distribution.
///
/// Mirrors the production worker's `detect_text_emotion`: truncates to
/// [`MAX_TEXT_CHARS`], scores every label, and applies the
/// `realization`/unknown -> `neutral` remap to the top label only (the raw
/// label and full distribution are unaffected by the remap).
pub fn classify_text(text: &str) -> TextEmotionResult {
    let truncated: String = text.chars().take(MAX_TEXT_CHARS).collect();
    let lower = truncated.to_ascii_lowercase();

    if truncated.trim().len() < 2 {
        let mut all_scores = HashMap::new();
        all_scores.insert(EmotionLabel::Neutral, 1.0);
        return TextEmotionResult {
            label: EmotionLabel::Neutral,
            confidence: 0.5,
            all_scores,
            raw_label: EmotionLabel::Neutral,
        };
    }

    let mut raw_scores: HashMap<EmotionLabel, f64> = HashMap::new();
    for label in EmotionLabel::ALL {
        let hits = keyword_lexicon(label)
            .iter()
            .filter(|kw| lower.contains(*kw))
            .count();
        raw_scores.insert(label, hits as f64 + SMOOTHING);
    }

    let total: f64 = raw_scores.values().sum();
    let mut all_scores: HashMap<EmotionLabel, f64> = raw_scores
        .iter()
        .map(|(&label, &score)| (label, score / total))
        .collect();

    let (raw_label, _) = all_scores
        .iter()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(&l, &s)| (l, s))
        .unwrap_or((EmotionLabel::Neutral, 1.0));

    // Keep the distribution normalized, but report the selected label's
    // confidence from the (possibly remapped) winning bucket.
    let confidence = *all_scores.get(&raw_label).unwrap_or(&0.5);
    let label = raw_label.remap_technical();
    if label != raw_label {
        // Merge the remapped mass into `neutral` so `all_scores` stays
        // internally consistent with the emitted label.
        let moved = all_scores.remove(&raw_label).unwrap_or(0.0);
        *all_scores.entry(label).or_insert(0.0) += moved;
    }

    TextEmotionResult {
        label,
        confidence,
        all_scores,
        raw_label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_neutral_half_confidence() {
        let result = classify_text("");
        assert_eq!(result.label, EmotionLabel::Neutral);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn anxious_text_classifies_as_nervousness_or_fear() {
        let result = classify_text("I keep worrying about my exam tomorrow and can't sleep");
        assert!(matches!(
            result.label,
            EmotionLabel::Nervousness | EmotionLabel::Fear
        ));
        assert!(result.confidence > 0.1);
    }

    #[test]
    fn realization_raw_label_remaps_to_neutral() {
        let result = classify_text("I just realized something about myself, it hit me suddenly");
        assert_eq!(result.raw_label, EmotionLabel::Realization);
        assert_eq!(result.label, EmotionLabel::Neutral);
    }

    #[test]
    fn all_scores_sum_to_approximately_one() {
        let result = classify_text("I am so happy and grateful today, what a wonderful surprise");
        let sum: f64 = result.all_scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-6, "sum was {sum}");
    }

    #[test]
    fn text_longer_than_limit_is_truncated_before_scoring() {
        let long_text = "x".repeat(10_000) + " happy";
        let result = classify_text(&long_text);
        // The "happy" keyword sits past the truncation boundary, so it
        // should have no measurable effect versus plain padding.
        let baseline = classify_text(&"x".repeat(10_000));
        assert_eq!(result.label, baseline.label);
    }
}

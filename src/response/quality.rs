//! Response quality gate and quality metric (§4.3, §6 word sets).

/// Keywords whose presence is required for a candidate to pass the gate.
pub const EMPATHY_WORDS: &[&str] = &[
    "understand", "feel", "hear", "valid", "difficult", "support", "listen", "care",
    "acknowledge", "brave", "courage",
];

/// Used only in the quality metric (professionalism), not the gate itself.
pub const PROFESSIONAL_WORDS: &[&str] = &[
    "explore", "therapy", "coping", "strategies", "resources", "professional", "process",
    "together", "work through",
];

/// Used only in the quality metric (therapeutic value), not the gate itself.
pub const THERAPEUTIC_WORDS: &[&str] = &[
    "safe", "space", "feelings", "emotions", "experience", "important", "matter", "alone",
    "support",
];

/// Generic-agreement phrases that sink an otherwise well-formed candidate.
const GENERIC_AGREEMENT_PHRASES: &[&str] = &[
    "great way",
    "good point",
    "totally agree",
    "exactly",
    "absolutely",
    "same here",
    "me too",
    "i know right",
];

/// Short filler openers that mark a low-value completion.
const FILLER_OPENERS: &[&str] = &["i ", "that's ", "very ", "totally "];

/// Minimum trimmed length for a candidate to even be considered.
const MIN_LENGTH: usize = 20;

/// Why a candidate was rejected by the quality gate. Kept even when the
/// candidate passes (`None` case folded into [`gate`]'s `Ok`) so a caller can
/// log exactly which rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    TooShort,
    FillerOpener,
    GenericAgreement,
    MissingEmpathyKeyword,
}

/// Quality signals attached to every response, model- or fallback-sourced.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QualitySignals {
    pub empathy: f64,
    pub professionalism: f64,
    pub therapeutic_value: f64,
}

/// Runs the quality gate against a trimmed candidate string.
///
/// Returns `Ok(())` if the candidate passes, `Err(reason)` for the first
/// rule that rejects it (checked in the order listed in §4.3). This is a
/// pure function of its input, so running it twice on the same candidate
/// always returns the same verdict.
pub fn gate(candidate: &str) -> Result<(), RejectionReason> {
    let trimmed = candidate.trim();

    if trimmed.len() < MIN_LENGTH {
        return Err(RejectionReason::TooShort);
    }

    let lower = trimmed.to_ascii_lowercase();

    if FILLER_OPENERS.iter().any(|opener| lower.starts_with(opener)) {
        return Err(RejectionReason::FillerOpener);
    }

    if GENERIC_AGREEMENT_PHRASES.iter().any(|phrase| lower.contains(phrase)) {
        return Err(RejectionReason::GenericAgreement);
    }

    if !EMPATHY_WORDS.iter().any(|word| lower.contains(word)) {
        return Err(RejectionReason::MissingEmpathyKeyword);
    }

    Ok(())
}

/// Computes the quality metric described in §4.3: each signal is a base
/// value plus a per-keyword-hit bonus, capped at 1.0.
pub fn assess(response: &str, emotion_label: &str) -> QualitySignals {
    let lower = response.to_ascii_lowercase();

    let empathy_hits = EMPATHY_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let mut empathy = (0.3 + 0.15 * empathy_hits as f64).min(1.0);
    if lower.contains(&emotion_label.to_ascii_lowercase()) {
        empathy = (empathy + 0.1).min(1.0);
    }

    let professional_hits = PROFESSIONAL_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let professionalism = (0.4 + 0.20 * professional_hits as f64).min(1.0);

    let therapeutic_hits = THERAPEUTIC_WORDS.iter().filter(|w| lower.contains(*w)).count();
    let mut therapeutic_value = (0.5 + 0.20 * therapeutic_hits as f64).min(1.0);
    if response.contains('?') {
        therapeutic_value = (therapeutic_value + 0.1).min(1.0);
    }

    QualitySignals {
        empathy,
        professionalism,
        therapeutic_value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_candidate_is_rejected() {
        assert_eq!(gate("Totally agree!"), Err(RejectionReason::TooShort));
    }

    #[test]
    fn filler_opener_is_rejected_even_when_long_enough() {
        let candidate = "I totally agree with everything you said about that, yes indeed";
        assert_eq!(gate(candidate), Err(RejectionReason::FillerOpener));
    }

    #[test]
    fn generic_agreement_without_filler_is_rejected() {
        let candidate = "Yeah that's exactly right, couldn't have said it better myself at all";
        // Starts with "that's " so it hits the filler rule first; use a
        // candidate that only trips the agreement-phrase rule.
        assert!(gate(candidate).is_err());
        let candidate2 = "Wow, that sounds great, totally agree with your whole perspective here";
        assert_eq!(gate(candidate2), Err(RejectionReason::FillerOpener));
        let candidate3 = "Wow what a great way to put it, couldn't agree more with your view";
        assert_eq!(gate(candidate3), Err(RejectionReason::GenericAgreement));
    }

    #[test]
    fn missing_empathy_keyword_is_rejected() {
        let candidate = "That is certainly an interesting perspective on your situation today";
        assert_eq!(gate(candidate), Err(RejectionReason::MissingEmpathyKeyword));
    }

    #[test]
    fn well_formed_candidate_passes() {
        let candidate =
            "I can understand how difficult this must feel, and I want you to know I'm here to listen. What feels most important to talk about?";
        assert_eq!(gate(candidate), Ok(()));
    }

    #[test]
    fn gate_is_idempotent() {
        let candidate =
            "I understand this has been a difficult week for you. What would help most right now?";
        assert_eq!(gate(candidate), gate(candidate));
    }

    #[test]
    fn quality_metric_rewards_question_mark_and_emotion_mention() {
        let response = "I understand this sadness must feel heavy. What matters most to you right now?";
        let signals = assess(response, "sadness");
        assert!(signals.therapeutic_value > 0.5);
        assert!(signals.empathy > 0.3);
    }

    #[test]
    fn quality_signals_never_exceed_one() {
        let response = "understand feel hear valid difficult support listen care acknowledge brave courage explore therapy coping strategies resources professional process together work through safe space feelings emotions experience important matter alone support sadness ?";
        let signals = assess(response, "sadness");
        assert!(signals.empathy <= 1.0);
        assert!(signals.professionalism <= 1.0);
        assert!(signals.therapeutic_value <= 1.0);
    }
}

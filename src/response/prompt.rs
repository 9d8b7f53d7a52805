//! Prompt assembly for the model-backed response generator (§4.3).

/// Default prompt token budget; halved on memory-constrained deployments.
pub const MAX_PROMPT_TOKENS_DEFAULT: usize = 400;
pub const MAX_PROMPT_TOKENS_CONSTRAINED: usize = 250;

/// Closed table of emotion-specific therapeutic framing prefixes. Emotions
/// outside this table use the `general` framing.
fn framing_for(emotion: &str) -> &'static str {
    match crate::response::fallback::resolve_key(emotion) {
        "anxiety" => "You are a compassionate therapist speaking with someone experiencing anxiety. Respond with grounded empathy; avoid minimizing their worry.",
        "nervousness" => "You are a compassionate therapist speaking with someone who is nervous. Validate the feeling without dismissing what's driving it.",
        "depression" => "You are a compassionate therapist speaking with someone experiencing depression. Respond gently; never suggest they simply 'cheer up'.",
        "sadness" => "You are a compassionate therapist speaking with someone who is sad. Sit with the feeling rather than rushing to fix it.",
        "stress" => "You are a compassionate therapist speaking with someone under significant stress. Help them feel heard before offering any structure.",
        "anger" => "You are a compassionate therapist speaking with someone who is angry. Validate the feeling and explore what's underneath it.",
        "fear" => "You are a compassionate therapist speaking with someone who is afraid. Offer grounded reassurance without dismissing the fear.",
        "joy" => "You are a compassionate therapist speaking with someone who is happy. Celebrate with them and explore what's contributing to it.",
        "admiration" => "You are a compassionate therapist speaking with someone expressing admiration or appreciation. Explore what resonates with them.",
        _ => "You are a compassionate therapist. Respond with warmth, validate the person's feelings, and ask one open question.",
    }
}

/// Assembles the generation prompt: system framing, then serialized history
/// pairs (oldest first), then the current user turn, then a role tag.
/// Truncates to `max_tokens` (a crude whitespace-token estimate) by dropping
/// the oldest history lines first — the current user text and role tag are
/// never dropped.
pub fn assemble(user_text: &str, emotion: &str, history: &[String], max_tokens: usize) -> String {
    let framing = framing_for(emotion);
    let mut history_lines: Vec<&str> = history.iter().map(String::as_str).collect();

    loop {
        let prompt = render(framing, &history_lines, user_text);
        if token_estimate(&prompt) <= max_tokens || history_lines.is_empty() {
            return prompt;
        }
        history_lines.remove(0);
    }
}

fn render(framing: &str, history_lines: &[&str], user_text: &str) -> String {
    let mut prompt = String::from(framing);
    prompt.push('\n');
    for line in history_lines {
        prompt.push_str(line);
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(user_text);
    prompt.push_str("\nTherapist:");
    prompt
}

fn token_estimate(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_differs_for_anxiety_and_general() {
        assert_ne!(framing_for("anxiety"), framing_for("general"));
    }

    #[test]
    fn unknown_emotion_uses_general_framing() {
        assert_eq!(framing_for("schadenfreude"), framing_for("general"));
    }

    #[test]
    fn assemble_includes_user_text_and_role_tag() {
        let prompt = assemble("I can't sleep", "nervousness", &[], 400);
        assert!(prompt.contains("I can't sleep"));
        assert!(prompt.ends_with("Therapist:"));
    }

    #[test]
    fn assemble_drops_oldest_history_to_fit_budget() {
        let history: Vec<String> = (0..50)
            .map(|i| format!("User: filler line number {i} with several words in it"))
            .collect();
        let prompt = assemble("current message", "general", &history, 40);
        assert!(token_estimate(&prompt) <= 40 || !prompt.contains("filler line number 0 "));
    }

    #[test]
    fn assemble_never_drops_current_user_text_even_under_tiny_budget() {
        let history: Vec<String> = vec!["User: hi".into(), "Therapist: hello".into()];
        let prompt = assemble("this must survive truncation", "general", &history, 1);
        assert!(prompt.contains("this must survive truncation"));
    }
}

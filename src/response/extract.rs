//! Response extraction: turns a raw model completion into a single
//! assistant turn (§4.3 "Response extraction").

const ROLE_TAGS: &[&str] = &["User:", "Assistant:", "Therapist:"];

/// Strips an echoed prompt, keeps only the assistant's first turn, and
/// truncates at the first blank line.
///
/// `raw` is the model's full completion, which may or may not include the
/// prompt verbatim at the front (mistralrs-style chat completions normally
/// return only the continuation, but this stays defensive against models
/// that echo it).
pub fn extract(raw: &str, prompt: &str) -> String {
    let without_prompt = raw.strip_prefix(prompt).unwrap_or(raw);

    // Keep content up to (but not including) the next role tag, so a model
    // that hallucinates a continued dialogue doesn't leak extra turns.
    let mut end = without_prompt.len();
    for tag in ROLE_TAGS {
        if let Some(pos) = without_prompt.find(tag) {
            // Skip a tag at position 0 (the therapist's own role tag, if the
            // model echoed it back).
            if pos > 0 {
                end = end.min(pos);
            }
        }
    }
    let mut candidate = &without_prompt[..end];

    // Drop a leading role tag the model echoed for its own turn.
    for tag in ROLE_TAGS {
        if let Some(stripped) = candidate.strip_prefix(tag) {
            candidate = stripped;
            break;
        }
    }

    // Truncate at the first double-newline (start of a new paragraph/turn).
    let candidate = match candidate.find("\n\n") {
        Some(pos) => &candidate[..pos],
        None => candidate,
    };

    candidate.trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_echoed_prompt_prefix() {
        let prompt = "You are a therapist.\nUser: hi\nTherapist:";
        let raw = format!("{prompt} I hear you, what's going on?");
        assert_eq!(extract(&raw, prompt), "I hear you, what's going on?");
    }

    #[test]
    fn keeps_only_first_turn_when_model_continues_dialogue() {
        let prompt = "Therapist:";
        let raw = " I understand this is hard.\nUser: thanks\nTherapist: glad to help";
        assert_eq!(extract(raw, prompt), "I understand this is hard.");
    }

    #[test]
    fn truncates_at_first_double_newline() {
        let prompt = "Therapist:";
        let raw = " I hear you.\n\nSome unrelated trailing content that should be dropped.";
        assert_eq!(extract(raw, prompt), "I hear you.");
    }

    #[test]
    fn strips_leading_role_tag_echoed_by_model() {
        let prompt = "";
        let raw = "Therapist: I understand how hard this is.";
        assert_eq!(extract(raw, prompt), "I understand how hard this is.");
    }
}

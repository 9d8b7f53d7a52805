//! Salient-token extraction for the `text_with_context` mode.
//!
//! The production worker ties this to a full NLP pipeline (entities plus
//! non-stopword content words via spaCy), with a plain word-split fallback
//! already present when that pipeline is unavailable. Per the spec's
//! Open Questions, this crate adopts that fallback path as the only
//! implementation: split on whitespace/punctuation, drop stopwords and short
//! tokens, dedupe case-insensitively preserving first-seen order, cap at 10.

const MAX_CONTEXT_TOKENS: usize = 10;
const MIN_TOKEN_LEN: usize = 4;

const STOPWORDS: &[&str] = &[
    "the", "and", "that", "this", "with", "from", "have", "has", "had", "not", "are", "was",
    "were", "been", "being", "they", "them", "their", "what", "when", "where", "which", "who",
    "whom", "why", "how", "about", "into", "over", "under", "again", "further", "then", "once",
    "here", "there", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such",
    "only", "own", "same", "than", "too", "very", "just", "because", "while", "after", "before",
    "above", "below", "between", "through", "during", "your", "you're", "i'm", "i've", "don't",
    "doesn't", "didn't", "can't", "wasn't", "weren't", "isn't", "aren't", "will", "would",
    "could", "should", "really", "still", "also",
];

/// Extracts up to [`MAX_CONTEXT_TOKENS`] salient content words from `text`.
pub fn extract_context(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut context = Vec::new();

    for raw in text.split(|c: char| !c.is_alphanumeric() && c != '\'') {
        if raw.is_empty() {
            continue;
        }
        let lower = raw.to_ascii_lowercase();
        if lower.len() <= MIN_TOKEN_LEN - 1 {
            continue;
        }
        if STOPWORDS.contains(&lower.as_str()) {
            continue;
        }
        if !seen.insert(lower.clone()) {
            continue;
        }
        context.push(lower);
        if context.len() >= MAX_CONTEXT_TOKENS {
            break;
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_short_tokens() {
        let context = extract_context("I was so worried about my exam tomorrow and could not sleep");
        assert!(!context.contains(&"was".to_string()));
        assert!(!context.contains(&"and".to_string()));
        assert!(context.contains(&"worried".to_string()));
        assert!(context.contains(&"exam".to_string()));
        assert!(context.contains(&"tomorrow".to_string()));
    }

    #[test]
    fn dedupes_case_insensitively_preserving_first_seen_order() {
        let context = extract_context("Worried worried WORRIED about exams, exams again");
        assert_eq!(context.iter().filter(|t| *t == "worried").count(), 1);
        assert_eq!(context[0], "worried");
    }

    #[test]
    fn caps_at_ten_tokens() {
        let many = (0..30)
            .map(|i| format!("keyword{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        let context = extract_context(&many);
        assert_eq!(context.len(), MAX_CONTEXT_TOKENS);
    }

    #[test]
    fn empty_text_yields_empty_context() {
        assert!(extract_context("").is_empty());
    }
}

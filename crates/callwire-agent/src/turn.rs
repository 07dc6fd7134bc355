use crate::provider::{ChatMessage, TurnDetector};

/// Words after which a speaker is usually mid-sentence.
const CONTINUATION_WORDS: &[&str] = &[
    "and", "but", "or", "so", "because", "um", "uh", "like", "the", "a", "to", "with", "if",
    "then", "that", "which",
];

/// End-of-turn estimate from the shape of the pending transcript.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTurnDetector;

impl TurnDetector for HeuristicTurnDetector {
    fn end_of_turn_probability(&self, _history: &[ChatMessage], pending: &str) -> f32 {
        let text = pending.trim();
        if text.is_empty() {
            return 0.0;
        }
        if text.ends_with("...") || text.ends_with('…') {
            return 0.3;
        }
        if text.ends_with(['.', '!', '?', '。', '！', '？']) {
            return 0.9;
        }

        let last_word = text
            .rsplit(|c: char| c.is_whitespace())
            .next()
            .unwrap_or(text)
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if CONTINUATION_WORDS.contains(&last_word.as_str()) {
            return 0.1;
        }

        0.6
    }
}

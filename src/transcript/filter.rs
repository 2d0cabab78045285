//! Hallucination filtering for ASR output
//!
//! Speech models fed near-silence tend to emit generic filler ("thank you
//! for watching"), bracketed sound-effect tags, or a single token repeated.
//! This filter rejects those artifacts before they reach reconciliation.

/// Formulaic phrases ASR services produce from silence or music.
/// Compared against the whole transcript, lowercased and trimmed.
const DENYLIST: &[&str] = &[
    "thank you",
    "thank you.",
    "thanks for watching",
    "thanks for watching!",
    "thank you for watching",
    "thank you for watching!",
    "thank you for watching.",
    "please subscribe",
    "subscribe",
    "like and subscribe",
    "see you next time",
    "see you in the next video",
    "music",
    "[music]",
    "[applause]",
    "[laughter]",
    "[silence]",
    "[blank_audio]",
    "(music)",
    "(applause)",
    "(laughter)",
];

/// Decide whether a transcript carries real speech content.
///
/// Pure predicate: no state, no side effects.
pub fn is_valid(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.chars().count() < 3 {
        return false;
    }

    let lowered = trimmed.to_lowercase();
    if DENYLIST.contains(&lowered.as_str()) {
        return false;
    }

    // Whitespace, emoji and punctuation carry no speech
    if !trimmed.chars().any(|c| c.is_alphanumeric()) {
        return false;
    }

    let words: Vec<&str> = lowered.split_whitespace().collect();
    match words.len() {
        0 => false,
        // A lone short token is noise, not an utterance
        1 => words[0].chars().count() >= 4,
        // Degenerate repetition ("a a a a")
        _ => !words.windows(2).all(|pair| pair[0] == pair[1]),
    }
}

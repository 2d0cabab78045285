//! Source comparison: merging two transcript lanes into one attributed stream
//!
//! Speaker attribution here is physics, not machine learning: the channel
//! that produced the sound names the speaker. The one ambiguity is acoustic
//! leakage, where the microphone hears remote audio played through the
//! speakers and the same utterance arrives on both lanes within a short
//! window. Text similarity resolves that cheaply.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::audio::AudioStreamSource;
use crate::transcript::{PendingTranscript, TranscriptMessage};

/// Reconciler tuning knobs
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Maximum timestamp gap for two transcripts to be pairing candidates
    pub pairing_window_ms: u64,
    /// Word-overlap ratio at or above which paired texts count as one utterance
    pub similarity_threshold: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            pairing_window_ms: 2000,
            similarity_threshold: 0.8,
        }
    }
}

/// Pairs transcripts across the two capture lanes.
///
/// Holds at most one pending transcript per source; a new arrival for a
/// source overwrites any unconsumed predecessor (last-write-wins). When both
/// slots fill, the pair resolves immediately:
///
/// - far apart in time: unrelated utterances, both emitted
/// - close and textually similar: microphone echo of system audio, one
///   Guest message emitted with the system-channel text
/// - close and dissimilar: genuinely simultaneous speech, both emitted
///
/// Single-stream sessions bypass the slots entirely; every microphone
/// transcript is emitted as Host speech in arrival order.
pub struct Reconciler {
    config: ReconcilerConfig,
    dual_stream: bool,
    mic_slot: Option<PendingTranscript>,
    system_slot: Option<PendingTranscript>,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig, dual_stream: bool) -> Self {
        Self {
            config,
            dual_stream,
            mic_slot: None,
            system_slot: None,
        }
    }

    /// Feed one transcript; returns zero, one, or two finished messages.
    pub fn accept(&mut self, pending: PendingTranscript) -> Vec<TranscriptMessage> {
        if !self.dual_stream {
            return vec![TranscriptMessage::from_pending(pending)];
        }

        let slot = match pending.source {
            AudioStreamSource::Microphone => &mut self.mic_slot,
            AudioStreamSource::System => &mut self.system_slot,
        };

        if let Some(previous) = slot.replace(pending) {
            warn!(
                "unpaired {:?} transcript overwritten: {:?}",
                previous.source, previous.text
            );
        }

        match (self.mic_slot.take(), self.system_slot.take()) {
            (Some(mic), Some(system)) => self.resolve_pair(mic, system),
            (mic, system) => {
                self.mic_slot = mic;
                self.system_slot = system;
                Vec::new()
            }
        }
    }

    /// Emit whatever is still waiting for a counterpart that will never
    /// arrive. Called once when the session's transcript stream ends.
    pub fn flush(&mut self) -> Vec<TranscriptMessage> {
        let mut messages = Vec::new();
        if let Some(mic) = self.mic_slot.take() {
            messages.push(TranscriptMessage::from_pending(mic));
        }
        if let Some(system) = self.system_slot.take() {
            messages.push(TranscriptMessage::from_pending(system));
        }
        messages
    }

    fn resolve_pair(
        &self,
        mic: PendingTranscript,
        system: PendingTranscript,
    ) -> Vec<TranscriptMessage> {
        let delta_ms = mic.timestamp_ms.abs_diff(system.timestamp_ms);

        if delta_ms > self.config.pairing_window_ms {
            // Unrelated utterances that happened to meet in the slots
            return Self::emit_both(mic, system);
        }

        let similarity = text_similarity(&mic.text, &system.text);
        if similarity >= self.config.similarity_threshold {
            debug!(
                "collapsed cross-channel echo (similarity {:.2}, gap {}ms)",
                similarity, delta_ms
            );
            // The system channel carries the cleaner signal
            return vec![TranscriptMessage::from_pending(system)];
        }

        Self::emit_both(mic, system)
    }

    fn emit_both(mic: PendingTranscript, system: PendingTranscript) -> Vec<TranscriptMessage> {
        // Chronological order; the microphone wins ties
        let (first, second) = if system.timestamp_ms < mic.timestamp_ms {
            (system, mic)
        } else {
            (mic, system)
        };

        vec![
            TranscriptMessage::from_pending(first),
            TranscriptMessage::from_pending(second),
        ]
    }
}

/// Word-overlap similarity between two texts.
///
/// Both sides are lowercased and stripped of punctuation; the score is
/// `|intersection| / max(|words_a|, |words_b|)`, so 1.0 means one side's
/// vocabulary fully covers the other.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    let words_a = normalized_words(a);
    let words_b = normalized_words(b);

    if words_a.is_empty() || words_b.is_empty() {
        return 0.0;
    }

    let common = words_a.intersection(&words_b).count();
    common as f64 / words_a.len().max(words_b.len()) as f64
}

fn normalized_words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_similarity_identical_texts() {
        assert_eq!(text_similarity("hello world", "hello world"), 1.0);
    }

    #[test]
    fn test_similarity_ignores_case_and_punctuation() {
        assert_eq!(
            text_similarity("Let's begin the meeting", "lets begin the meeting!"),
            1.0
        );
    }

    #[test]
    fn test_similarity_disjoint_texts() {
        assert_eq!(text_similarity("alpha beta", "gamma delta"), 0.0);
    }

    #[test]
    fn test_similarity_partial_overlap() {
        let score = text_similarity("can you hear me", "yes i hear you");
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_empty_text() {
        assert_eq!(text_similarity("", "hello"), 0.0);
        assert_eq!(text_similarity("!!!", "hello"), 0.0);
    }
}

// Tests for cross-channel transcript reconciliation
//
// These cover the three resolution cases (far apart, echo collapse,
// simultaneous distinct speech), the single-stream bypass, and the
// last-write-wins slot policy.

use duoscribe::audio::AudioStreamSource;
use duoscribe::reconcile::{Reconciler, ReconcilerConfig};
use duoscribe::transcript::{PendingTranscript, Speaker};

fn pending(source: AudioStreamSource, text: &str, timestamp_ms: u64) -> PendingTranscript {
    PendingTranscript {
        source,
        speaker_hint: Speaker::from(source),
        text: text.to_string(),
        timestamp_ms,
    }
}

fn mic(text: &str, timestamp_ms: u64) -> PendingTranscript {
    pending(AudioStreamSource::Microphone, text, timestamp_ms)
}

fn system(text: &str, timestamp_ms: u64) -> PendingTranscript {
    pending(AudioStreamSource::System, text, timestamp_ms)
}

fn dual_reconciler() -> Reconciler {
    Reconciler::new(ReconcilerConfig::default(), true)
}

#[test]
fn test_lone_transcript_stays_pending() {
    let mut reconciler = dual_reconciler();

    let out = reconciler.accept(mic("Can you hear me", 1000));
    assert!(out.is_empty(), "first arrival should wait for its counterpart");
}

#[test]
fn test_echo_collapse_emits_one_guest_message() {
    let mut reconciler = dual_reconciler();

    assert!(reconciler.accept(mic("Let's begin the meeting", 1000)).is_empty());
    let out = reconciler.accept(system("Let's begin the meeting", 1300));

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].speaker, Speaker::Guest);
    assert_eq!(out[0].text, "Let's begin the meeting");
    assert_eq!(out[0].source, AudioStreamSource::System);
}

#[test]
fn test_echo_collapse_keeps_system_channel_text() {
    let mut reconciler = dual_reconciler();

    // Same words, slightly garbled punctuation on the mic side
    assert!(reconciler.accept(mic("let's begin, the meeting", 500)).is_empty());
    let out = reconciler.accept(system("Let's begin the meeting", 700));

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].text, "Let's begin the meeting");
}

#[test]
fn test_far_apart_transcripts_emit_independently() {
    let mut reconciler = dual_reconciler();

    assert!(reconciler.accept(mic("Let's begin the meeting", 1000)).is_empty());
    let out = reconciler.accept(system("Let's begin the meeting", 3500));

    assert_eq!(out.len(), 2, "identical text outside the window is unrelated");
    assert_eq!(out[0].speaker, Speaker::Host);
    assert_eq!(out[1].speaker, Speaker::Guest);
    assert_eq!(out[0].text, "Let's begin the meeting");
    assert_eq!(out[1].text, "Let's begin the meeting");
}

#[test]
fn test_simultaneous_distinct_speech_emits_both() {
    let mut reconciler = dual_reconciler();

    assert!(reconciler.accept(mic("Can you hear me", 1000)).is_empty());
    let out = reconciler.accept(system("Yes I hear you", 1200));

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].speaker, Speaker::Host);
    assert_eq!(out[0].text, "Can you hear me");
    assert_eq!(out[1].speaker, Speaker::Guest);
    assert_eq!(out[1].text, "Yes I hear you");
}

#[test]
fn test_gap_at_window_boundary_still_pairs() {
    let mut reconciler = dual_reconciler();

    assert!(reconciler.accept(mic("Let's begin the meeting", 1000)).is_empty());
    // Exactly 2000ms apart: still inside the pairing window
    let out = reconciler.accept(system("Let's begin the meeting", 3000));

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].speaker, Speaker::Guest);
}

#[test]
fn test_similarity_at_threshold_collapses() {
    let mut reconciler = dual_reconciler();

    // 4 of 5 words shared: similarity exactly 0.8
    assert!(reconciler
        .accept(mic("alpha beta gamma delta epsilon", 1000))
        .is_empty());
    let out = reconciler.accept(system("alpha beta gamma delta zeta", 1100));

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].speaker, Speaker::Guest);
}

#[test]
fn test_slots_clear_after_resolution() {
    let mut reconciler = dual_reconciler();

    reconciler.accept(mic("Can you hear me", 1000));
    reconciler.accept(system("Yes I hear you", 1200));

    // Next arrival starts a fresh pairing cycle
    let out = reconciler.accept(mic("Moving on to the agenda", 5000));
    assert!(out.is_empty());
}

#[test]
fn test_last_write_wins_overwrites_unpaired_predecessor() {
    let mut reconciler = dual_reconciler();

    assert!(reconciler.accept(mic("The first thought", 100)).is_empty());
    assert!(reconciler.accept(mic("The second thought", 400)).is_empty());

    let out = reconciler.accept(system("Something entirely different", 500));

    assert_eq!(out.len(), 2);
    assert!(out.iter().all(|m| m.text != "The first thought"));
    assert!(out.iter().any(|m| m.text == "The second thought"));
}

#[test]
fn test_single_stream_mode_bypasses_pairing() {
    let mut reconciler = Reconciler::new(ReconcilerConfig::default(), false);

    let first = reconciler.accept(mic("First utterance here", 1000));
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].speaker, Speaker::Host);

    let second = reconciler.accept(mic("Second utterance here", 9000));
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].speaker, Speaker::Host);
    assert_eq!(second[0].text, "Second utterance here");

    assert!(reconciler.flush().is_empty(), "bypass mode never buffers");
}

#[test]
fn test_flush_emits_leftover_slots() {
    let mut reconciler = dual_reconciler();

    reconciler.accept(mic("Trailing words before hangup", 1000));
    let out = reconciler.flush();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].speaker, Speaker::Host);
    assert_eq!(out[0].text, "Trailing words before hangup");

    assert!(reconciler.flush().is_empty(), "flush drains the slots");
}

#[test]
fn test_emission_is_chronological_for_unrelated_pair() {
    let mut reconciler = dual_reconciler();

    assert!(reconciler.accept(system("The earlier remark", 1000)).is_empty());
    let out = reconciler.accept(mic("A much later remark", 4000));

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].speaker, Speaker::Guest);
    assert_eq!(out[1].speaker, Speaker::Host);
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use crate::audio::AudioStreamSource;

/// Statistics snapshot for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Whether recording is currently active
    pub is_recording: bool,

    /// Whether the microphone is muted
    pub muted: bool,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of audio chunks encoded across both lanes
    pub chunks_encoded: usize,

    /// Number of chunks handed to the transcription service
    pub dispatches: usize,

    /// Number of chunks skipped (silence or rate limit)
    pub dispatch_skips: usize,

    /// Cumulative transcription failures on the microphone lane
    pub mic_failures: u32,

    /// Cumulative transcription failures on the system lane
    pub system_failures: u32,

    /// Number of reconciled transcripts delivered to the consumer
    pub transcripts_emitted: usize,
}

/// Live counters shared across the pipeline tasks.
///
/// Failure streaks are tracked separately from cumulative totals: a streak
/// resets on any success and is what triggers the degraded-mode notice.
#[derive(Debug, Default)]
pub struct SessionCounters {
    chunks_encoded: AtomicUsize,
    dispatches: AtomicUsize,
    dispatch_skips: AtomicUsize,
    transcripts_emitted: AtomicUsize,
    mic_failures: AtomicU32,
    system_failures: AtomicU32,
    mic_streak: AtomicU32,
    system_streak: AtomicU32,
}

impl SessionCounters {
    pub fn record_chunk(&self) {
        self.chunks_encoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.dispatch_skips.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_transcript(&self) {
        self.transcripts_emitted.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a transcription failure; returns the current streak length.
    pub fn record_failure(&self, source: AudioStreamSource) -> u32 {
        let (total, streak) = self.failure_cells(source);
        total.fetch_add(1, Ordering::Relaxed);
        streak.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn reset_failure_streak(&self, source: AudioStreamSource) {
        let (_, streak) = self.failure_cells(source);
        streak.store(0, Ordering::Relaxed);
    }

    pub fn chunks_encoded(&self) -> usize {
        self.chunks_encoded.load(Ordering::Relaxed)
    }

    pub fn dispatches(&self) -> usize {
        self.dispatches.load(Ordering::Relaxed)
    }

    pub fn dispatch_skips(&self) -> usize {
        self.dispatch_skips.load(Ordering::Relaxed)
    }

    pub fn transcripts_emitted(&self) -> usize {
        self.transcripts_emitted.load(Ordering::Relaxed)
    }

    pub fn failures(&self, source: AudioStreamSource) -> u32 {
        let (total, _) = self.failure_cells(source);
        total.load(Ordering::Relaxed)
    }

    fn failure_cells(&self, source: AudioStreamSource) -> (&AtomicU32, &AtomicU32) {
        match source {
            AudioStreamSource::Microphone => (&self.mic_failures, &self.mic_streak),
            AudioStreamSource::System => (&self.system_failures, &self.system_streak),
        }
    }
}

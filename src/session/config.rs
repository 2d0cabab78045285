use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// Duration of each audio chunk before the encoder rotates
    /// Default: 8 seconds
    pub chunk_duration: Duration,

    /// Sample rate for audio processing (speech models expect 16kHz)
    pub sample_rate: u32,

    /// Number of audio channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Minimum gap between two transcription dispatches
    pub min_dispatch_interval: Duration,

    /// Cap on transcription dispatches per rolling minute
    pub max_dispatches_per_minute: usize,

    /// Chunk payloads below this size are treated as silence
    pub silence_threshold_bytes: usize,

    /// Consecutive failures on one source before the consumer is notified
    pub max_consecutive_failures: u32,

    /// Word-overlap ratio at or above which paired transcripts merge
    pub similarity_threshold: f64,

    /// Maximum timestamp gap for cross-channel pairing
    pub pairing_window: Duration,

    /// Base URL of the transcription service
    pub service_url: String,

    /// Model identifier sent with each dispatch
    pub model: String,

    /// Use synthetic capture sources instead of real devices
    pub simulated_capture: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            chunk_duration: Duration::from_secs(8),
            sample_rate: 16000,
            channels: 1,
            min_dispatch_interval: Duration::from_millis(1000),
            max_dispatches_per_minute: 30,
            silence_threshold_bytes: 1024,
            max_consecutive_failures: 3,
            similarity_threshold: 0.8,
            pairing_window: Duration::from_millis(2000),
            service_url: "http://localhost:8080".to_string(),
            model: "whisper-1".to_string(),
            simulated_capture: false,
        }
    }
}

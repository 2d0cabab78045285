use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audio::AudioStreamSource;

/// Which participant an utterance is attributed to.
///
/// Attribution is physical, not acoustic: the microphone channel belongs to
/// the local participant, the system channel to the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// Local participant, captured via the microphone channel
    Host,
    /// Remote participant, captured via the system/loopback channel
    Guest,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Host => "host",
            Speaker::Guest => "guest",
        }
    }
}

impl From<AudioStreamSource> for Speaker {
    fn from(source: AudioStreamSource) -> Self {
        match source {
            AudioStreamSource::Microphone => Speaker::Host,
            AudioStreamSource::System => Speaker::Guest,
        }
    }
}

/// A transcript waiting in the reconciler for its cross-channel counterpart.
#[derive(Debug, Clone)]
pub struct PendingTranscript {
    pub source: AudioStreamSource,
    pub speaker_hint: Speaker,
    pub text: String,
    /// Position on the capture timeline (end of the transcribed chunk)
    pub timestamp_ms: u64,
}

/// Final speaker-attributed utterance delivered to the consumer callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub speaker: Speaker,
    pub text: String,
    #[serde(rename = "audioSource")]
    pub source: AudioStreamSource,
}

impl TranscriptMessage {
    pub fn from_pending(pending: PendingTranscript) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            speaker: pending.speaker_hint,
            text: pending.text,
            source: pending.source,
        }
    }
}

//! HTTP client for the external transcription service
//!
//! The service accepts a multipart POST with the audio payload and channel
//! metadata, and answers with either a flat transcript or per-speaker
//! segments. A lightweight health endpoint decides at session start whether
//! to run live or fall back to simulated transcripts.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::audio::AudioChunk;
use crate::error::DispatchError;
use crate::transcript::Speaker;

/// Structured reply from the transcription service.
///
/// Either shape is valid; anything else is a `FormatError`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TranscriptionResponse {
    Plain { text: String },
    Segmented { segments: Vec<TranscriptionSegment> },
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionSegment {
    pub speaker: String,
    pub text: String,
}

impl TranscriptionResponse {
    /// Flatten the response into one transcript string.
    pub fn joined_text(&self) -> String {
        match self {
            TranscriptionResponse::Plain { text } => text.trim().to_string(),
            TranscriptionResponse::Segmented { segments } => segments
                .iter()
                .map(|s| s.text.trim())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }
}

/// Transcription collaborator seam.
///
/// The dispatcher only sees this trait, so tests and degraded sessions can
/// swap the HTTP client out without touching the pipeline.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
        speaker_hint: Speaker,
    ) -> Result<TranscriptionResponse, DispatchError>;

    /// Probe the service. `false` means the session should fall back.
    async fn health_check(&self) -> bool;
}

/// Live HTTP transcriber.
pub struct HttpTranscriber {
    client: Client,
    base_url: String,
    model: String,
}

impl HttpTranscriber {
    pub fn new(base_url: &str, model: &str) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(
        &self,
        chunk: &AudioChunk,
        speaker_hint: Speaker,
    ) -> Result<TranscriptionResponse, DispatchError> {
        let filename = format!("{}-{:05}.wav", chunk.source.as_str(), chunk.sequence);

        debug!(
            "dispatching {:?} chunk {} ({} bytes)",
            chunk.source,
            chunk.sequence,
            chunk.wav_bytes.len()
        );

        let audio_part = Part::bytes(chunk.wav_bytes.clone())
            .file_name(filename)
            .mime_str("audio/wav")
            .map_err(|e| DispatchError::Format(e.to_string()))?;

        let form = Form::new()
            .part("audio", audio_part)
            .text("model", self.model.clone())
            .text("speaker", speaker_hint.as_str())
            .text("audioSource", chunk.source.as_str());

        let response = self
            .client
            .post(format!("{}/transcriptions", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(DispatchError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        serde_json::from_str(&body).map_err(|_| {
            let mut preview = body;
            preview.truncate(200);
            DispatchError::Format(preview)
        })
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                info!("transcription service health check failed: {}", e);
                false
            }
        }
    }
}

/// Stand-in collaborator for sessions running without a reachable service.
///
/// Cycles through canned transcripts so downstream consumers still see the
/// full pipeline shape.
pub struct SimulatedTranscriber {
    counter: AtomicUsize,
}

const SIMULATED_LINES: &[&str] = &[
    "This is a simulated transcript while the service is offline",
    "Simulated speech continues on this channel",
    "Still running in simulated transcription mode",
];

impl SimulatedTranscriber {
    pub fn new() -> Self {
        Self {
            counter: AtomicUsize::new(0),
        }
    }
}

impl Default for SimulatedTranscriber {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Transcriber for SimulatedTranscriber {
    async fn transcribe(
        &self,
        _chunk: &AudioChunk,
        _speaker_hint: Speaker,
    ) -> Result<TranscriptionResponse, DispatchError> {
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(TranscriptionResponse::Plain {
            text: SIMULATED_LINES[index % SIMULATED_LINES.len()].to_string(),
        })
    }

    async fn health_check(&self) -> bool {
        true
    }
}

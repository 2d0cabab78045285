use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::client::Transcriber;
use super::rate_limit::RateLimiter;
use crate::audio::AudioChunk;
use crate::session::SessionCounters;
use crate::transcript::{filter, ErrorHandler, PendingTranscript, Speaker};

/// Dispatcher tuning knobs
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Payloads below this size are treated as silence and never dispatched
    pub silence_threshold_bytes: usize,
    /// Minimum gap between two dispatches
    pub min_dispatch_interval: Duration,
    /// Cap on dispatches per rolling minute
    pub max_dispatches_per_minute: usize,
    /// Consecutive failures on one source before the consumer is notified
    pub max_consecutive_failures: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            silence_threshold_bytes: 1024,
            min_dispatch_interval: Duration::from_millis(1000),
            max_dispatches_per_minute: 30,
            max_consecutive_failures: 3,
        }
    }
}

/// Feeds audio chunks to the transcription collaborator.
///
/// Trivial (silent) chunks are dropped before any network call, the rate
/// limiter turns bursts into soft skips, and each surviving chunk is
/// dispatched on its own task so a slow response never stalls chunk intake.
/// Successful transcripts pass the hallucination filter before they are
/// forwarded to the reconciler.
pub struct TranscriptionDispatcher {
    config: DispatcherConfig,
    transcriber: Arc<dyn Transcriber>,
    limiter: RateLimiter,
    pending_tx: mpsc::Sender<PendingTranscript>,
    on_error: ErrorHandler,
    counters: Arc<SessionCounters>,
}

impl TranscriptionDispatcher {
    pub fn new(
        config: DispatcherConfig,
        transcriber: Arc<dyn Transcriber>,
        pending_tx: mpsc::Sender<PendingTranscript>,
        on_error: ErrorHandler,
        counters: Arc<SessionCounters>,
    ) -> Self {
        let limiter = RateLimiter::new(
            config.min_dispatch_interval,
            config.max_dispatches_per_minute,
        );

        Self {
            config,
            transcriber,
            limiter,
            pending_tx,
            on_error,
            counters,
        }
    }

    /// Consume chunks until the channel closes, then wait out requests that
    /// were already accepted. A chunk taken before shutdown is always either
    /// completed or loudly dropped, never silently lost.
    pub async fn run(mut self, mut chunks: mpsc::Receiver<AudioChunk>) {
        info!("transcription dispatcher started");

        let mut in_flight = JoinSet::new();

        while let Some(chunk) = chunks.recv().await {
            self.accept(chunk, &mut in_flight);
        }

        while in_flight.join_next().await.is_some() {}

        info!("transcription dispatcher stopped");
    }

    fn accept(&mut self, chunk: AudioChunk, in_flight: &mut JoinSet<()>) {
        if chunk.wav_bytes.len() < self.config.silence_threshold_bytes {
            debug!(
                "{:?} chunk {} below silence threshold ({} bytes), skipping",
                chunk.source,
                chunk.sequence,
                chunk.wav_bytes.len()
            );
            self.counters.record_skip();
            return;
        }

        if self.limiter.check(Instant::now()).is_err() {
            warn!(
                "{:?} chunk {} skipped: dispatch rate limit",
                chunk.source, chunk.sequence
            );
            self.counters.record_skip();
            (self.on_error)(format!(
                "transcription rate limit reached; skipped a {} chunk",
                chunk.source.as_str()
            ));
            return;
        }

        self.counters.record_dispatch();

        let transcriber = Arc::clone(&self.transcriber);
        let pending_tx = self.pending_tx.clone();
        let on_error = Arc::clone(&self.on_error);
        let counters = Arc::clone(&self.counters);
        let max_failures = self.config.max_consecutive_failures;

        in_flight.spawn(async move {
            dispatch_chunk(
                transcriber,
                chunk,
                pending_tx,
                on_error,
                counters,
                max_failures,
            )
            .await;
        });
    }
}

async fn dispatch_chunk(
    transcriber: Arc<dyn Transcriber>,
    chunk: AudioChunk,
    pending_tx: mpsc::Sender<PendingTranscript>,
    on_error: ErrorHandler,
    counters: Arc<SessionCounters>,
    max_failures: u32,
) {
    let speaker_hint = Speaker::from(chunk.source);

    match transcriber.transcribe(&chunk, speaker_hint).await {
        Ok(response) => {
            counters.reset_failure_streak(chunk.source);

            let text = response.joined_text();
            if !filter::is_valid(&text) {
                debug!(
                    "{:?} transcript rejected as hallucination: {:?}",
                    chunk.source, text
                );
                return;
            }

            let pending = PendingTranscript {
                source: chunk.source,
                speaker_hint,
                text,
                timestamp_ms: chunk.end_ms,
            };

            if pending_tx.send(pending).await.is_err() {
                warn!("reconciler closed; dropping {:?} transcript", chunk.source);
            }
        }
        Err(e) => {
            let streak = counters.record_failure(chunk.source);
            error!(
                "{:?} transcription failed (streak {}): {}",
                chunk.source, streak, e
            );

            if streak == max_failures {
                (on_error)(format!(
                    "{} transcription has failed {} times in a row; consider degraded mode",
                    chunk.source.as_str(),
                    streak
                ));
            }
        }
    }
}

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::stats::{SessionCounters, SessionStats};
use crate::audio::{
    spawn_chunk_lane, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioStreamSource,
    ChunkEncoder, EncoderConfig,
};
use crate::dispatch::{
    DispatcherConfig, HttpTranscriber, SimulatedTranscriber, Transcriber, TranscriptionDispatcher,
};
use crate::reconcile::{Reconciler, ReconcilerConfig};
use crate::transcript::{ErrorHandler, PendingTranscript, TranscriptHandler, TranscriptMessage};

/// Pipeline mode selected at initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineMode {
    /// Both capture channels available; reconciliation active
    DualStream,
    /// Microphone only; transcripts pass straight through as Host speech
    SingleStream,
}

/// A capture session that owns the whole pipeline: two capture lanes,
/// chunk encoding, transcription dispatch, and reconciliation.
///
/// Lifecycle: construct, `initialize`, `start`, `stop`, `cleanup`.
/// Reconciled transcripts and error notices reach the consumer through
/// registered callbacks; nothing here panics across that boundary.
pub struct CaptureSession {
    config: SessionConfig,

    /// When the session was created
    started_at: chrono::DateTime<chrono::Utc>,

    /// Whether recording is currently active
    is_recording: Arc<AtomicBool>,

    /// Whether the microphone is muted
    muted: Arc<AtomicBool>,

    /// Selected at initialize; `None` until then
    mode: Option<PipelineMode>,

    mic_backend: Option<Box<dyn AudioBackend>>,
    system_backend: Option<Box<dyn AudioBackend>>,

    /// Transcription collaborator; built at initialize unless injected
    transcriber: Option<Arc<dyn Transcriber>>,

    counters: Arc<SessionCounters>,

    /// Signals the chunk lanes to flush and exit
    shutdown_tx: watch::Sender<bool>,

    /// Handles for the pipeline tasks spawned by `start`
    tasks: Vec<JoinHandle<()>>,

    on_transcript: Option<TranscriptHandler>,
    on_error: Option<ErrorHandler>,
}

impl CaptureSession {
    pub fn new(config: SessionConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            started_at: Utc::now(),
            is_recording: Arc::new(AtomicBool::new(false)),
            muted: Arc::new(AtomicBool::new(false)),
            mode: None,
            mic_backend: None,
            system_backend: None,
            transcriber: None,
            counters: Arc::new(SessionCounters::default()),
            shutdown_tx,
            tasks: Vec::new(),
            on_transcript: None,
            on_error: None,
        }
    }

    /// Create a session with a custom transcription collaborator instead of
    /// the HTTP client (used by tests and embedders).
    pub fn with_transcriber(config: SessionConfig, transcriber: Arc<dyn Transcriber>) -> Self {
        let mut session = Self::new(config);
        session.transcriber = Some(transcriber);
        session
    }

    /// Register the consumer callback for reconciled transcripts.
    pub fn on_transcript<F>(&mut self, handler: F)
    where
        F: Fn(TranscriptMessage) + Send + Sync + 'static,
    {
        self.on_transcript = Some(Arc::new(handler));
    }

    /// Register the consumer callback for error notices.
    pub fn on_error<F>(&mut self, handler: F)
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
    }

    /// Acquire capture sources and probe the transcription service.
    ///
    /// The microphone is mandatory: acquisition failure aborts the session.
    /// System audio is optional: failure downgrades to single-stream mode.
    /// An unreachable transcription service downgrades to simulated
    /// transcripts; the session still runs.
    pub async fn initialize(&mut self) -> Result<PipelineMode> {
        info!("initializing capture session: {}", self.config.session_id);

        let backend_config = AudioBackendConfig {
            target_sample_rate: self.config.sample_rate,
            target_channels: self.config.channels,
            ..AudioBackendConfig::default()
        };

        let mic = match AudioBackendFactory::create(
            AudioStreamSource::Microphone,
            backend_config.clone(),
            self.config.simulated_capture,
        ) {
            Ok(backend) => backend,
            Err(e) => {
                self.emit_error(e.to_string());
                return Err(e).context("microphone acquisition failed");
            }
        };
        self.mic_backend = Some(mic);

        match AudioBackendFactory::create(
            AudioStreamSource::System,
            backend_config,
            self.config.simulated_capture,
        ) {
            Ok(backend) => {
                self.system_backend = Some(backend);
            }
            Err(e) => {
                warn!("{}; running single-stream", e);
                self.system_backend = None;
            }
        }

        let mode = if self.system_backend.is_some() {
            PipelineMode::DualStream
        } else {
            PipelineMode::SingleStream
        };
        self.mode = Some(mode);

        let transcriber: Arc<dyn Transcriber> = match self.transcriber.take() {
            Some(injected) => injected,
            None => Arc::new(HttpTranscriber::new(
                &self.config.service_url,
                &self.config.model,
            )?),
        };

        let transcriber = if transcriber.health_check().await {
            transcriber
        } else {
            self.emit_error(
                "transcription service unreachable; running in simulated mode".to_string(),
            );
            Arc::new(SimulatedTranscriber::new())
        };
        self.transcriber = Some(transcriber);

        info!("capture session initialized in {:?} mode", mode);
        Ok(mode)
    }

    /// Spawn the pipeline tasks and begin recording.
    pub async fn start(&mut self) -> Result<()> {
        if self.mode.is_none() {
            anyhow::bail!("session not initialized");
        }

        if self.is_recording.load(Ordering::SeqCst) {
            warn!("recording already started");
            return Ok(());
        }

        info!("starting capture session: {}", self.config.session_id);
        self.is_recording.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(false);

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (pending_tx, pending_rx) = mpsc::channel(64);

        let encoder_config = EncoderConfig {
            chunk_duration_ms: self.config.chunk_duration.as_millis() as u64,
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
        };

        // Microphone lane (always present)
        let mic_backend = self
            .mic_backend
            .as_mut()
            .context("microphone backend missing")?;
        let mic_frames = mic_backend
            .start()
            .await
            .context("failed to start microphone capture")?;
        self.tasks.push(spawn_chunk_lane(
            AudioStreamSource::Microphone,
            mic_frames,
            ChunkEncoder::wav(AudioStreamSource::Microphone, encoder_config.clone()),
            chunk_tx.clone(),
            self.shutdown_tx.subscribe(),
            Arc::clone(&self.counters),
        ));

        // System lane (optional); a start failure here downgrades rather
        // than aborting the session
        let mut dual_stream = false;
        if let Some(system_backend) = self.system_backend.as_mut() {
            match system_backend.start().await {
                Ok(system_frames) => {
                    self.tasks.push(spawn_chunk_lane(
                        AudioStreamSource::System,
                        system_frames,
                        ChunkEncoder::wav(AudioStreamSource::System, encoder_config),
                        chunk_tx.clone(),
                        self.shutdown_tx.subscribe(),
                        Arc::clone(&self.counters),
                    ));
                    dual_stream = true;
                }
                Err(e) => {
                    warn!(
                        "system capture failed to start: {:#}; continuing single-stream",
                        e
                    );
                    self.mode = Some(PipelineMode::SingleStream);
                }
            }
        }
        drop(chunk_tx);

        // Dispatcher
        let transcriber = self
            .transcriber
            .clone()
            .context("transcriber missing; initialize() not run")?;
        let dispatcher = TranscriptionDispatcher::new(
            DispatcherConfig {
                silence_threshold_bytes: self.config.silence_threshold_bytes,
                min_dispatch_interval: self.config.min_dispatch_interval,
                max_dispatches_per_minute: self.config.max_dispatches_per_minute,
                max_consecutive_failures: self.config.max_consecutive_failures,
            },
            transcriber,
            pending_tx,
            self.error_handler(),
            Arc::clone(&self.counters),
        );
        self.tasks.push(tokio::spawn(dispatcher.run(chunk_rx)));

        // Reconciler
        let reconciler = Reconciler::new(
            ReconcilerConfig {
                pairing_window_ms: self.config.pairing_window.as_millis() as u64,
                similarity_threshold: self.config.similarity_threshold,
            },
            dual_stream,
        );
        self.tasks.push(tokio::spawn(run_reconciler(
            reconciler,
            pending_rx,
            self.transcript_handler(),
            Arc::clone(&self.counters),
        )));

        info!("capture session started");
        Ok(())
    }

    /// Mute or unmute the microphone track.
    ///
    /// Only the samples are affected; the encoder keeps running so chunk
    /// timing is never interrupted.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
        if let Some(backend) = &self.mic_backend {
            backend.set_muted(muted);
        }
        info!("microphone muted: {}", muted);
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Stop recording and wait for the pipeline to drain.
    ///
    /// Chunks already accepted by the dispatcher are completed, and the
    /// partial chunk in each encoder is flushed through before the tasks
    /// exit.
    pub async fn stop(&mut self) -> Result<SessionStats> {
        if !self.is_recording.load(Ordering::SeqCst) {
            warn!("recording not active");
            return Ok(self.stats());
        }

        info!("stopping capture session: {}", self.config.session_id);
        self.is_recording.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);

        if let Some(backend) = self.mic_backend.as_mut() {
            if let Err(e) = backend.stop().await {
                error!("failed to stop microphone capture: {:#}", e);
            }
        }
        if let Some(backend) = self.system_backend.as_mut() {
            if let Err(e) = backend.stop().await {
                error!("failed to stop system capture: {:#}", e);
            }
        }

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("pipeline task panicked: {}", e);
            }
        }

        info!("capture session stopped");
        Ok(self.stats())
    }

    /// Release everything. Idempotent and safe to call from any state.
    pub async fn cleanup(&mut self) {
        if self.is_recording.load(Ordering::SeqCst) {
            if let Err(e) = self.stop().await {
                error!("stop during cleanup failed: {:#}", e);
            }
        }

        self.mic_backend = None;
        self.system_backend = None;
        self.mode = None;
        debug!("session resources released");
    }

    /// Current session statistics
    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);

        SessionStats {
            is_recording: self.is_recording.load(Ordering::SeqCst),
            muted: self.muted.load(Ordering::SeqCst),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            chunks_encoded: self.counters.chunks_encoded(),
            dispatches: self.counters.dispatches(),
            dispatch_skips: self.counters.dispatch_skips(),
            mic_failures: self.counters.failures(AudioStreamSource::Microphone),
            system_failures: self.counters.failures(AudioStreamSource::System),
            transcripts_emitted: self.counters.transcripts_emitted(),
        }
    }

    fn transcript_handler(&self) -> TranscriptHandler {
        self.on_transcript.clone().unwrap_or_else(|| Arc::new(|_| {}))
    }

    fn error_handler(&self) -> ErrorHandler {
        self.on_error.clone().unwrap_or_else(|| Arc::new(|_| {}))
    }

    fn emit_error(&self, message: String) {
        error!("{}", message);
        if let Some(handler) = &self.on_error {
            handler(message);
        }
    }
}

/// Pump pending transcripts through the reconciler until the stream ends,
/// then flush whatever is still waiting for a counterpart.
async fn run_reconciler(
    mut reconciler: Reconciler,
    mut pending_rx: mpsc::Receiver<PendingTranscript>,
    on_transcript: TranscriptHandler,
    counters: Arc<SessionCounters>,
) {
    info!("reconciler started");

    while let Some(pending) = pending_rx.recv().await {
        for message in reconciler.accept(pending) {
            counters.record_transcript();
            on_transcript(message);
        }
    }

    for message in reconciler.flush() {
        counters.record_transcript();
        on_transcript(message);
    }

    info!("reconciler stopped");
}

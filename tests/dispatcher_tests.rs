// Tests for the transcription dispatcher
//
// A stub collaborator stands in for the HTTP service so these can verify
// the silence pre-filter, rate limiting, hallucination filtering, and
// per-source failure streaks without any network.

use duoscribe::audio::{AudioChunk, AudioStreamSource};
use duoscribe::dispatch::{
    DispatcherConfig, Transcriber, TranscriptionDispatcher, TranscriptionResponse,
};
use duoscribe::error::DispatchError;
use duoscribe::session::SessionCounters;
use duoscribe::transcript::{PendingTranscript, Speaker};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone, Copy)]
enum StubBehavior {
    Reply(&'static str),
    Fail,
}

struct StubTranscriber {
    behavior: StubBehavior,
    calls: AtomicUsize,
}

impl StubTranscriber {
    fn new(behavior: StubBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(
        &self,
        _chunk: &AudioChunk,
        _speaker_hint: Speaker,
    ) -> Result<TranscriptionResponse, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            StubBehavior::Reply(text) => Ok(TranscriptionResponse::Plain {
                text: text.to_string(),
            }),
            StubBehavior::Fail => Err(DispatchError::Network("connection refused".into())),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

fn chunk(source: AudioStreamSource, sequence: u64, end_ms: u64, payload_len: usize) -> AudioChunk {
    AudioChunk {
        source,
        sequence,
        start_ms: end_ms.saturating_sub(8000),
        end_ms,
        wav_bytes: vec![0u8; payload_len],
    }
}

fn permissive_config() -> DispatcherConfig {
    DispatcherConfig {
        silence_threshold_bytes: 1024,
        min_dispatch_interval: Duration::from_millis(0),
        max_dispatches_per_minute: 1000,
        max_consecutive_failures: 3,
    }
}

/// Run the dispatcher over a fixed set of chunks and collect its output.
async fn run_dispatcher(
    config: DispatcherConfig,
    transcriber: Arc<StubTranscriber>,
    chunks: Vec<AudioChunk>,
) -> (Vec<PendingTranscript>, Vec<String>, Arc<SessionCounters>) {
    let (pending_tx, mut pending_rx) = mpsc::channel(64);
    let (chunk_tx, chunk_rx) = mpsc::channel(64);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let error_sink = Arc::clone(&errors);
    let counters = Arc::new(SessionCounters::default());

    let dispatcher = TranscriptionDispatcher::new(
        config,
        transcriber,
        pending_tx,
        Arc::new(move |notice| error_sink.lock().unwrap().push(notice)),
        Arc::clone(&counters),
    );
    let handle = tokio::spawn(dispatcher.run(chunk_rx));

    for c in chunks {
        chunk_tx.send(c).await.unwrap();
    }
    drop(chunk_tx);
    handle.await.unwrap();

    let mut pendings = Vec::new();
    while let Ok(pending) = pending_rx.try_recv() {
        pendings.push(pending);
    }
    let notices = errors.lock().unwrap().clone();

    (pendings, notices, counters)
}

#[tokio::test]
async fn test_silent_chunk_never_reaches_the_network() {
    let stub = StubTranscriber::new(StubBehavior::Reply("Let's discuss the budget"));

    let (pendings, notices, counters) = run_dispatcher(
        permissive_config(),
        Arc::clone(&stub),
        vec![chunk(AudioStreamSource::Microphone, 0, 8000, 100)],
    )
    .await;

    assert_eq!(stub.calls(), 0, "sub-threshold payload must not dispatch");
    assert!(pendings.is_empty());
    assert!(notices.is_empty(), "silence skip is not an error");
    assert_eq!(counters.dispatch_skips(), 1);
    assert_eq!(counters.dispatches(), 0);
}

#[tokio::test]
async fn test_min_interval_skips_second_dispatch() {
    let stub = StubTranscriber::new(StubBehavior::Reply("Let's discuss the budget"));
    let config = DispatcherConfig {
        min_dispatch_interval: Duration::from_millis(1000),
        ..permissive_config()
    };

    let (_pendings, notices, counters) = run_dispatcher(
        config,
        Arc::clone(&stub),
        vec![
            chunk(AudioStreamSource::Microphone, 0, 8000, 4096),
            chunk(AudioStreamSource::Microphone, 1, 16000, 4096),
        ],
    )
    .await;

    assert_eq!(stub.calls(), 1, "second chunk lands inside the interval");
    assert_eq!(counters.dispatches(), 1);
    assert_eq!(counters.dispatch_skips(), 1);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].contains("rate limit"));
}

#[tokio::test]
async fn test_successful_dispatch_forwards_pending_transcript() {
    let stub = StubTranscriber::new(StubBehavior::Reply("Let's discuss the budget"));

    let (pendings, _notices, counters) = run_dispatcher(
        permissive_config(),
        Arc::clone(&stub),
        vec![chunk(AudioStreamSource::Microphone, 0, 8000, 4096)],
    )
    .await;

    assert_eq!(pendings.len(), 1);
    assert_eq!(pendings[0].source, AudioStreamSource::Microphone);
    assert_eq!(pendings[0].speaker_hint, Speaker::Host);
    assert_eq!(pendings[0].text, "Let's discuss the budget");
    assert_eq!(pendings[0].timestamp_ms, 8000, "timestamp is the chunk end");
    assert_eq!(counters.dispatches(), 1);
}

#[tokio::test]
async fn test_system_chunk_carries_guest_hint() {
    let stub = StubTranscriber::new(StubBehavior::Reply("Yes I hear you fine"));

    let (pendings, _notices, _counters) = run_dispatcher(
        permissive_config(),
        stub,
        vec![chunk(AudioStreamSource::System, 0, 8000, 4096)],
    )
    .await;

    assert_eq!(pendings.len(), 1);
    assert_eq!(pendings[0].speaker_hint, Speaker::Guest);
}

#[tokio::test]
async fn test_hallucination_is_dropped_after_transcription() {
    let stub = StubTranscriber::new(StubBehavior::Reply("Thank you for watching"));

    let (pendings, notices, _counters) = run_dispatcher(
        permissive_config(),
        Arc::clone(&stub),
        vec![chunk(AudioStreamSource::Microphone, 0, 8000, 4096)],
    )
    .await;

    assert_eq!(stub.calls(), 1, "the network call still happens");
    assert!(pendings.is_empty(), "formulaic filler never reaches reconciliation");
    assert!(notices.is_empty());
}

#[tokio::test]
async fn test_failure_streak_raises_degraded_mode_notice() {
    let stub = StubTranscriber::new(StubBehavior::Fail);

    let (pendings, notices, counters) = run_dispatcher(
        permissive_config(),
        Arc::clone(&stub),
        vec![
            chunk(AudioStreamSource::Microphone, 0, 8000, 4096),
            chunk(AudioStreamSource::Microphone, 1, 16000, 4096),
            chunk(AudioStreamSource::Microphone, 2, 24000, 4096),
        ],
    )
    .await;

    assert!(pendings.is_empty());
    assert_eq!(counters.failures(AudioStreamSource::Microphone), 3);
    assert_eq!(counters.failures(AudioStreamSource::System), 0);
    assert_eq!(notices.len(), 1, "one notice at the streak threshold");
    assert!(notices[0].contains("degraded"));
}

#[tokio::test]
async fn test_failures_are_counted_per_source() {
    let stub = StubTranscriber::new(StubBehavior::Fail);

    let (_pendings, notices, counters) = run_dispatcher(
        permissive_config(),
        stub,
        vec![
            chunk(AudioStreamSource::Microphone, 0, 8000, 4096),
            chunk(AudioStreamSource::System, 0, 8000, 4096),
        ],
    )
    .await;

    assert_eq!(counters.failures(AudioStreamSource::Microphone), 1);
    assert_eq!(counters.failures(AudioStreamSource::System), 1);
    assert!(notices.is_empty(), "neither source hit its streak threshold");
}

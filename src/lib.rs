pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod reconcile;
pub mod session;
pub mod transcript;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioChunk, AudioFrame,
    AudioStreamSource, ChunkEncoder, EncoderConfig, SimulatedBackend,
};
pub use config::Config;
pub use dispatch::{
    DispatcherConfig, HttpTranscriber, RateLimiter, SimulatedTranscriber, Transcriber,
    TranscriptionDispatcher, TranscriptionResponse,
};
pub use error::{CaptureError, DispatchError};
pub use reconcile::{Reconciler, ReconcilerConfig};
pub use session::{CaptureSession, PipelineMode, SessionConfig, SessionCounters, SessionStats};
pub use transcript::{PendingTranscript, Speaker, TranscriptMessage};

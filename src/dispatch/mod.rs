pub mod client;
pub mod dispatcher;
pub mod rate_limit;

pub use client::{
    HttpTranscriber, SimulatedTranscriber, Transcriber, TranscriptionResponse,
    TranscriptionSegment,
};
pub use dispatcher::{DispatcherConfig, TranscriptionDispatcher};
pub use rate_limit::RateLimiter;

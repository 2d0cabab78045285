use thiserror::Error;

/// Errors raised while acquiring or driving capture hardware.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The microphone could not be acquired. Fatal for the session.
    #[error("microphone unavailable: {0}")]
    MicrophoneDenied(String),

    /// System/loopback audio could not be acquired. The session downgrades
    /// to single-stream mode instead of failing.
    #[error("system audio unavailable: {0}")]
    SystemAudioUnavailable(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Errors raised while dispatching a chunk to the transcription service.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("transcription request failed: {0}")]
    Network(String),

    #[error("transcription service returned status {status}: {message}")]
    Service { status: u16, message: String },

    /// Dispatch skipped because the rolling rate limit was hit.
    /// Soft: never counted as a source failure.
    #[error("dispatch rate limit exceeded")]
    RateLimited,

    #[error("unrecognized transcription response: {0}")]
    Format(String),
}

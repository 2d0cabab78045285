//! Capture session management
//!
//! This module provides the `CaptureSession` abstraction that manages:
//! - Dual-channel audio capture (microphone + optional system audio)
//! - Chunk encoding and per-source lane scheduling
//! - Transcription dispatch with rate limiting and failure tracking
//! - Cross-channel reconciliation and consumer delivery
//! - Session statistics and mute state

mod config;
mod session;
mod stats;

pub use config::SessionConfig;
pub use session::{CaptureSession, PipelineMode};
pub use stats::{SessionCounters, SessionStats};

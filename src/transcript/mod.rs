//! Transcript types and the consumer boundary
//!
//! This module owns the shapes that cross out of the pipeline: pending
//! transcripts headed for reconciliation, final speaker-attributed messages,
//! and the callbacks the consumer registers to receive them.

pub mod filter;
mod messages;

pub use messages::{PendingTranscript, Speaker, TranscriptMessage};

use std::sync::Arc;

/// Consumer callback for reconciled transcripts.
pub type TranscriptHandler = Arc<dyn Fn(TranscriptMessage) + Send + Sync>;

/// Consumer callback for session-significant error notices.
/// Errors cross this boundary as human-readable strings, never as panics.
pub type ErrorHandler = Arc<dyn Fn(String) + Send + Sync>;

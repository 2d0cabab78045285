use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub dispatch: DispatchConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub chunk_duration_secs: u64,
    pub simulated: bool,
}

#[derive(Debug, Deserialize)]
pub struct DispatchConfig {
    pub min_interval_ms: u64,
    pub max_per_minute: usize,
    pub silence_threshold_bytes: usize,
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Deserialize)]
pub struct ReconcileConfig {
    pub pairing_window_ms: u64,
    pub similarity_threshold: f64,
}

impl Config {
    /// Load configuration from `DUOSCRIBE_`-prefixed environment variables
    /// (e.g. `DUOSCRIBE_AUDIO__CHUNK_DURATION_SECS=10`), with built-in
    /// defaults for everything.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .set_default("service.base_url", "http://localhost:8080")?
            .set_default("service.model", "whisper-1")?
            .set_default("audio.sample_rate", 16000)?
            .set_default("audio.channels", 1)?
            .set_default("audio.chunk_duration_secs", 8)?
            .set_default("audio.simulated", false)?
            .set_default("dispatch.min_interval_ms", 1000)?
            .set_default("dispatch.max_per_minute", 30)?
            .set_default("dispatch.silence_threshold_bytes", 1024)?
            .set_default("dispatch.max_consecutive_failures", 3)?
            .set_default("reconcile.pairing_window_ms", 2000)?
            .set_default("reconcile.similarity_threshold", 0.8)?
            .add_source(
                config::Environment::with_prefix("DUOSCRIBE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Project this configuration onto a session.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            chunk_duration: Duration::from_secs(self.audio.chunk_duration_secs),
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            min_dispatch_interval: Duration::from_millis(self.dispatch.min_interval_ms),
            max_dispatches_per_minute: self.dispatch.max_per_minute,
            silence_threshold_bytes: self.dispatch.silence_threshold_bytes,
            max_consecutive_failures: self.dispatch.max_consecutive_failures,
            similarity_threshold: self.reconcile.similarity_threshold,
            pairing_window: Duration::from_millis(self.reconcile.pairing_window_ms),
            service_url: self.service.base_url.clone(),
            model: self.service.model.clone(),
            simulated_capture: self.audio.simulated,
            ..SessionConfig::default()
        }
    }
}

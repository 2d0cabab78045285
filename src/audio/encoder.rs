use anyhow::{Context, Result};
use std::io::Cursor;

use super::backend::{AudioFrame, AudioStreamSource};

/// Chunk encoding configuration
#[derive(Debug, Clone)]
pub struct EncoderConfig {
    /// Duration of each chunk in milliseconds (default: 8000)
    pub chunk_duration_ms: u64,
    /// Sample rate of incoming frames
    pub sample_rate: u32,
    /// Channel count of incoming frames
    pub channels: u16,
}

impl EncoderConfig {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            chunk_duration_ms: 8000,
            sample_rate,
            channels,
        }
    }
}

/// A bounded-duration slice of encoded audio from one source.
///
/// Produced at each encoder rotation boundary, consumed exactly once by the
/// dispatcher, never retained afterwards.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Which channel produced this chunk
    pub source: AudioStreamSource,
    /// Chunk number within its source lane (0-indexed)
    pub sequence: u64,
    /// Start time in milliseconds since capture started
    pub start_ms: u64,
    /// Timestamp of the last frame in this chunk
    pub end_ms: u64,
    /// Complete WAV payload ready for dispatch
    pub wav_bytes: Vec<u8>,
}

/// One bounded recording interval.
///
/// The start/stop/restart contract is capture-primitive agnostic: a session
/// collects frames between `start` and `stop`, and `stop` yields the finished
/// chunk. Restarting is just `stop` followed by `start`, so the coverage gap
/// is a single method call.
pub trait EncoderSession: Send {
    /// Begin a new interval at the given timeline position.
    fn start(&mut self, sequence: u64, start_ms: u64);

    /// Append a frame's samples; no-op unless started.
    fn push(&mut self, frame: &AudioFrame) -> Result<()>;

    /// Close the interval, yielding its chunk. `None` if nothing was buffered.
    fn stop(&mut self) -> Result<Option<AudioChunk>>;
}

/// Encoder session that renders buffered PCM as an in-memory WAV payload.
pub struct WavEncoderSession {
    source: AudioStreamSource,
    sample_rate: u32,
    channels: u16,
    samples: Vec<i16>,
    sequence: u64,
    start_ms: u64,
    end_ms: u64,
    active: bool,
}

impl WavEncoderSession {
    pub fn new(source: AudioStreamSource, sample_rate: u32, channels: u16) -> Self {
        Self {
            source,
            sample_rate,
            channels,
            samples: Vec::new(),
            sequence: 0,
            start_ms: 0,
            end_ms: 0,
            active: false,
        }
    }
}

impl EncoderSession for WavEncoderSession {
    fn start(&mut self, sequence: u64, start_ms: u64) {
        self.samples.clear();
        self.sequence = sequence;
        self.start_ms = start_ms;
        self.end_ms = start_ms;
        self.active = true;
    }

    fn push(&mut self, frame: &AudioFrame) -> Result<()> {
        if !self.active {
            return Ok(());
        }

        self.samples.extend_from_slice(&frame.samples);
        self.end_ms = frame.timestamp_ms;
        Ok(())
    }

    fn stop(&mut self) -> Result<Option<AudioChunk>> {
        self.active = false;

        if self.samples.is_empty() {
            return Ok(None);
        }

        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut wav_bytes = Vec::new();
        {
            let cursor = Cursor::new(&mut wav_bytes);
            let mut writer =
                hound::WavWriter::new(cursor, spec).context("Failed to create WAV writer")?;
            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            writer.finalize().context("Failed to finalize WAV chunk")?;
        }
        self.samples.clear();

        Ok(Some(AudioChunk {
            source: self.source,
            sequence: self.sequence,
            start_ms: self.start_ms,
            end_ms: self.end_ms,
            wav_bytes,
        }))
    }
}

/// Drives consecutive encoder sessions for one source, rotating on a fixed
/// chunk duration so the lane yields a steady stream of bounded chunks.
pub struct ChunkEncoder {
    config: EncoderConfig,
    session: Box<dyn EncoderSession>,
    sequence: u64,
    start_ms: u64,
    active: bool,
}

impl ChunkEncoder {
    pub fn new(config: EncoderConfig, session: Box<dyn EncoderSession>) -> Self {
        Self {
            config,
            session,
            sequence: 0,
            start_ms: 0,
            active: false,
        }
    }

    /// Convenience constructor with the WAV session wired in.
    pub fn wav(source: AudioStreamSource, config: EncoderConfig) -> Self {
        let session = WavEncoderSession::new(source, config.sample_rate, config.channels);
        Self::new(config, Box::new(session))
    }

    /// Feed one frame; returns a finished chunk when the active interval
    /// has covered the configured duration.
    pub fn push(&mut self, frame: &AudioFrame) -> Result<Option<AudioChunk>> {
        if !self.active {
            self.session.start(self.sequence, frame.timestamp_ms);
            self.start_ms = frame.timestamp_ms;
            self.active = true;
        }

        let mut finished = None;
        if frame.timestamp_ms.saturating_sub(self.start_ms) >= self.config.chunk_duration_ms {
            finished = self.session.stop()?;
            if finished.is_some() {
                self.sequence += 1;
            }
            self.session.start(self.sequence, frame.timestamp_ms);
            self.start_ms = frame.timestamp_ms;
        }

        self.session.push(frame)?;
        Ok(finished)
    }

    /// Close out the partial interval, if any. Called at session stop so the
    /// tail of the recording is still dispatched.
    pub fn flush(&mut self) -> Result<Option<AudioChunk>> {
        if !self.active {
            return Ok(None);
        }

        self.active = false;
        let finished = self.session.stop()?;
        if finished.is_some() {
            self.sequence += 1;
        }
        Ok(finished)
    }
}

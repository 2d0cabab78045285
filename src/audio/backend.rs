use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::error::CaptureError;

/// Input device names that mark a system-audio loopback source.
const LOOPBACK_MARKERS: &[&str] = &["monitor", "loopback", "blackhole", "soundflower", "stereo mix"];

/// Audio stream source type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioStreamSource {
    /// Microphone input (the local participant)
    Microphone,
    /// System/loopback audio (remote participants, shared playback)
    System,
}

impl AudioStreamSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioStreamSource::Microphone => "microphone",
            AudioStreamSource::System => "system",
        }
    }
}

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
    /// Which channel produced this frame
    pub source: AudioStreamSource,
}

/// Configuration for audio backends
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate (will downsample if needed)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Frame size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz for speech models
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms frames
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - `CpalBackend`: real devices via cpal (default input for the microphone,
///   a named loopback/monitor device for system audio)
/// - `SimulatedBackend`: synthetic tone generator for tests and demos
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Zero out captured samples without stopping the stream.
    /// Frame cadence and timestamps are unaffected.
    fn set_muted(&self, muted: bool);

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create a backend for the given source.
    ///
    /// Microphone acquisition failure is fatal (`MicrophoneDenied`); system
    /// acquisition failure is a downgrade signal (`SystemAudioUnavailable`).
    pub fn create(
        source: AudioStreamSource,
        config: AudioBackendConfig,
        simulated: bool,
    ) -> Result<Box<dyn AudioBackend>, CaptureError> {
        if simulated {
            return Ok(Box::new(SimulatedBackend::new(source, config)));
        }

        match source {
            AudioStreamSource::Microphone => Ok(Box::new(CpalBackend::microphone(config)?)),
            AudioStreamSource::System => Ok(Box::new(CpalBackend::system_loopback(config)?)),
        }
    }
}

/// How the capture thread re-acquires its device.
#[derive(Debug, Clone)]
enum DeviceSelector {
    DefaultInput,
    Named(String),
}

/// Capture backend over cpal input devices.
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread; frames
/// cross into async land over an mpsc channel.
pub struct CpalBackend {
    source: AudioStreamSource,
    selector: DeviceSelector,
    display_name: String,
    config: AudioBackendConfig,
    muted: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl CpalBackend {
    /// Acquire the default input device as the microphone channel.
    pub fn microphone(config: AudioBackendConfig) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::MicrophoneDenied("no default input device".into()))?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".into());

        info!("using microphone input: {}", device_name);

        Ok(Self::new(
            AudioStreamSource::Microphone,
            DeviceSelector::DefaultInput,
            format!("cpal-microphone ({})", device_name),
            config,
        ))
    }

    /// Acquire the first loopback/monitor input device as the system channel.
    pub fn system_loopback(config: AudioBackendConfig) -> Result<Self, CaptureError> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| CaptureError::SystemAudioUnavailable(e.to_string()))?;

        for device in devices {
            let Ok(name) = device.name() else { continue };
            let lowered = name.to_lowercase();
            if LOOPBACK_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                info!("using system loopback input: {}", name);
                return Ok(Self::new(
                    AudioStreamSource::System,
                    DeviceSelector::Named(name.clone()),
                    format!("cpal-system ({})", name),
                    config,
                ));
            }
        }

        Err(CaptureError::SystemAudioUnavailable(
            "no loopback/monitor input device found".into(),
        ))
    }

    fn new(
        source: AudioStreamSource,
        selector: DeviceSelector,
        display_name: String,
        config: AudioBackendConfig,
    ) -> Self {
        Self {
            source,
            selector,
            display_name,
            config,
            muted: Arc::new(AtomicBool::new(false)),
            capturing: Arc::new(AtomicBool::new(false)),
            thread: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for CpalBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing.load(Ordering::SeqCst) {
            anyhow::bail!("{} is already capturing", self.display_name);
        }

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.capturing.store(true, Ordering::SeqCst);

        let selector = self.selector.clone();
        let source = self.source;
        let config = self.config.clone();
        let muted = Arc::clone(&self.muted);
        let capturing = Arc::clone(&self.capturing);

        let thread = std::thread::spawn(move || {
            capture_thread(selector, source, config, muted, capturing, frame_tx, ready_tx);
        });
        self.thread = Some(thread);

        let ready = ready_rx
            .await
            .map_err(|_| anyhow!("capture thread exited before reporting readiness"));

        match ready {
            Ok(Ok(())) => {
                info!("{} capture started", self.display_name);
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                self.capturing.store(false, Ordering::SeqCst);
                Err(e.into())
            }
            Err(e) => {
                self.capturing.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread.take() {
            tokio::task::spawn_blocking(move || {
                if handle.join().is_err() {
                    error!("capture thread panicked");
                }
            })
            .await?;
        }

        info!("{} capture stopped", self.display_name);
        Ok(())
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.display_name
    }
}

/// Owns the cpal stream for its whole lifetime; the stream is dropped when
/// the capturing flag clears.
fn capture_thread(
    selector: DeviceSelector,
    source: AudioStreamSource,
    config: AudioBackendConfig,
    muted: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<Result<(), CaptureError>>,
) {
    match build_capture_stream(&selector, source, &config, muted, frame_tx) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            while capturing.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
        }
        Err(e) => {
            capturing.store(false, Ordering::SeqCst);
            let _ = ready_tx.send(Err(e));
        }
    }
}

fn build_capture_stream(
    selector: &DeviceSelector,
    source: AudioStreamSource,
    config: &AudioBackendConfig,
    muted: Arc<AtomicBool>,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> Result<cpal::Stream, CaptureError> {
    let device = resolve_device(selector)?;

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();

    debug!(
        "capture stream for {:?}: {}Hz, {} channels, {:?}",
        source, stream_config.sample_rate.0, stream_config.channels, sample_format
    );

    let assembler = FrameAssembler::new(
        source,
        config,
        stream_config.sample_rate.0,
        stream_config.channels,
        muted,
        frame_tx,
    );

    let stream = match sample_format {
        SampleFormat::I16 => build_stream_typed::<i16>(&device, &stream_config, assembler, |s| s),
        SampleFormat::U16 => build_stream_typed::<u16>(&device, &stream_config, assembler, |s| {
            (s as i32 - 32768) as i16
        }),
        SampleFormat::F32 => build_stream_typed::<f32>(&device, &stream_config, assembler, |s| {
            (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
        }),
        other => {
            return Err(CaptureError::Stream(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    }?;

    stream
        .play()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    Ok(stream)
}

fn resolve_device(selector: &DeviceSelector) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();

    match selector {
        DeviceSelector::DefaultInput => host.default_input_device().ok_or_else(|| {
            CaptureError::MicrophoneDenied("default input device disappeared".into())
        }),
        DeviceSelector::Named(name) => {
            let devices = host
                .input_devices()
                .map_err(|e| CaptureError::SystemAudioUnavailable(e.to_string()))?;
            for device in devices {
                if device.name().map(|n| n == *name).unwrap_or(false) {
                    return Ok(device);
                }
            }
            Err(CaptureError::SystemAudioUnavailable(format!(
                "input device {} disappeared",
                name
            )))
        }
    }
}

fn build_stream_typed<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    mut assembler: FrameAssembler,
    convert: impl Fn(T) -> i16 + Send + 'static,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample,
{
    device
        .build_input_stream(
            stream_config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                assembler.extend(data.iter().map(|&s| convert(s)));
            },
            |err| error!("audio stream error: {}", err),
            None,
        )
        .map_err(|e| CaptureError::Stream(e.to_string()))
}

/// Accumulates raw device samples and emits fixed-duration frames in the
/// target format. Runs inside the audio callback, so it never blocks: a
/// backlogged receiver drops the frame but the timestamp clock keeps running.
struct FrameAssembler {
    source: AudioStreamSource,
    target_rate: u32,
    target_channels: u16,
    in_rate: u32,
    in_channels: u16,
    samples_per_buffer: usize,
    buffer_duration_ms: u64,
    muted: Arc<AtomicBool>,
    buf: Vec<i16>,
    frames_sent: u64,
    tx: mpsc::Sender<AudioFrame>,
}

impl FrameAssembler {
    fn new(
        source: AudioStreamSource,
        config: &AudioBackendConfig,
        in_rate: u32,
        in_channels: u16,
        muted: Arc<AtomicBool>,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Self {
        let samples_per_buffer =
            (in_rate as u64 * config.buffer_duration_ms / 1000) as usize * in_channels as usize;

        Self {
            source,
            target_rate: config.target_sample_rate,
            target_channels: config.target_channels,
            in_rate,
            in_channels,
            samples_per_buffer: samples_per_buffer.max(1),
            buffer_duration_ms: config.buffer_duration_ms,
            muted,
            buf: Vec::with_capacity(samples_per_buffer.max(1) * 2),
            frames_sent: 0,
            tx,
        }
    }

    fn extend(&mut self, samples: impl Iterator<Item = i16>) {
        self.buf.extend(samples);

        while self.buf.len() >= self.samples_per_buffer {
            let raw: Vec<i16> = self.buf.drain(..self.samples_per_buffer).collect();
            self.emit(raw);
        }
    }

    fn emit(&mut self, raw: Vec<i16>) {
        let mut samples = raw;

        if self.in_channels == 2 && self.target_channels == 1 {
            samples = stereo_to_mono(&samples);
        }
        samples = downsample(&samples, self.in_rate, self.target_rate);

        if self.muted.load(Ordering::Relaxed) {
            samples.iter_mut().for_each(|s| *s = 0);
        }

        let frame = AudioFrame {
            samples,
            sample_rate: self.target_rate,
            channels: self.target_channels,
            timestamp_ms: self.frames_sent * self.buffer_duration_ms,
            source: self.source,
        };
        self.frames_sent += 1;

        if self.tx.try_send(frame).is_err() {
            debug!("frame receiver backlogged, dropping {:?} frame", self.source);
        }
    }
}

/// Downsample by decimation. Integer ratios only; lower rates pass through.
pub(crate) fn downsample(samples: &[i16], in_rate: u32, target_rate: u32) -> Vec<i16> {
    if in_rate <= target_rate {
        return samples.to_vec();
    }

    let ratio = (in_rate / target_rate).max(1) as usize;
    samples.iter().step_by(ratio).copied().collect()
}

/// Sum stereo pairs into mono with clipping.
pub(crate) fn stereo_to_mono(samples: &[i16]) -> Vec<i16> {
    samples
        .chunks_exact(2)
        .map(|pair| {
            let sum = pair[0] as i32 + pair[1] as i32;
            sum.clamp(i16::MIN as i32, i16::MAX as i32) as i16
        })
        .collect()
}

/// Synthetic capture source emitting a steady tone on the frame cadence.
///
/// Used by tests and device-less demo runs; honors the same mute contract
/// as the cpal backend.
pub struct SimulatedBackend {
    source: AudioStreamSource,
    config: AudioBackendConfig,
    display_name: String,
    muted: Arc<AtomicBool>,
    capturing: Arc<AtomicBool>,
}

impl SimulatedBackend {
    pub fn new(source: AudioStreamSource, config: AudioBackendConfig) -> Self {
        Self {
            source,
            config,
            display_name: format!("simulated-{}", source.as_str()),
            muted: Arc::new(AtomicBool::new(false)),
            capturing: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for SimulatedBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing.load(Ordering::SeqCst) {
            anyhow::bail!("{} is already capturing", self.display_name);
        }

        let (tx, rx) = mpsc::channel(64);
        self.capturing.store(true, Ordering::SeqCst);

        let source = self.source;
        let config = self.config.clone();
        let muted = Arc::clone(&self.muted);
        let capturing = Arc::clone(&self.capturing);

        tokio::spawn(async move {
            let samples_per_frame = (config.target_sample_rate as u64 * config.buffer_duration_ms
                / 1000) as usize
                * config.target_channels as usize;
            // Distinct tones per channel so crossed lanes are audible when debugging
            let tone_hz: f32 = match source {
                AudioStreamSource::Microphone => 440.0,
                AudioStreamSource::System => 330.0,
            };
            let step = tone_hz * std::f32::consts::TAU / config.target_sample_rate as f32;

            let mut interval =
                tokio::time::interval(Duration::from_millis(config.buffer_duration_ms));
            let mut frames_sent: u64 = 0;
            let mut phase: f32 = 0.0;

            while capturing.load(Ordering::SeqCst) {
                interval.tick().await;

                let samples: Vec<i16> = if muted.load(Ordering::Relaxed) {
                    vec![0; samples_per_frame]
                } else {
                    (0..samples_per_frame)
                        .map(|_| {
                            phase = (phase + step) % std::f32::consts::TAU;
                            (phase.sin() * 3000.0) as i16
                        })
                        .collect()
                };

                let frame = AudioFrame {
                    samples,
                    sample_rate: config.target_sample_rate,
                    channels: config.target_channels,
                    timestamp_ms: frames_sent * config.buffer_duration_ms,
                    source,
                };
                frames_sent += 1;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }

            debug!("simulated {:?} capture ended", source);
        });

        info!("{} capture started", self.display_name);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing.store(false, Ordering::SeqCst);
        info!("{} capture stopped", self.display_name);
        Ok(())
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        &self.display_name
    }
}

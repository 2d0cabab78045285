// Tests for fixed-duration chunk encoding
//
// These verify that audio frames are rotated into bounded WAV chunks on
// the configured duration, that the tail is flushed, and that payloads
// are well-formed WAV data.

use anyhow::Result;
use duoscribe::audio::{AudioFrame, AudioStreamSource, ChunkEncoder, EncoderConfig};

const SAMPLES_PER_FRAME: usize = 1600; // 100ms at 16kHz mono

fn frame(timestamp_ms: u64) -> AudioFrame {
    AudioFrame {
        samples: vec![100i16; SAMPLES_PER_FRAME],
        sample_rate: 16000,
        channels: 1,
        timestamp_ms,
        source: AudioStreamSource::Microphone,
    }
}

fn encoder(chunk_duration_ms: u64) -> ChunkEncoder {
    let config = EncoderConfig {
        chunk_duration_ms,
        sample_rate: 16000,
        channels: 1,
    };
    ChunkEncoder::wav(AudioStreamSource::Microphone, config)
}

#[test]
fn test_rotation_splits_into_multiple_chunks() -> Result<()> {
    let mut encoder = encoder(1000);
    let mut chunks = Vec::new();

    // 2.6 seconds of frames at 100ms intervals -> chunks at 1s boundaries
    for i in 0..26 {
        if let Some(chunk) = encoder.push(&frame(i * 100))? {
            chunks.push(chunk);
        }
    }
    if let Some(chunk) = encoder.flush()? {
        chunks.push(chunk);
    }

    assert_eq!(chunks.len(), 3, "2.6s of audio with 1s chunks");

    assert_eq!(chunks[0].sequence, 0);
    assert_eq!(chunks[0].start_ms, 0);
    assert_eq!(chunks[0].end_ms, 900);

    assert_eq!(chunks[1].sequence, 1);
    assert_eq!(chunks[1].start_ms, 1000);
    assert_eq!(chunks[1].end_ms, 1900);

    assert_eq!(chunks[2].sequence, 2);
    assert_eq!(chunks[2].start_ms, 2000);
    assert_eq!(chunks[2].end_ms, 2500);

    Ok(())
}

#[test]
fn test_chunks_carry_wav_payloads() -> Result<()> {
    let mut encoder = encoder(1000);
    let mut chunks = Vec::new();

    for i in 0..11 {
        if let Some(chunk) = encoder.push(&frame(i * 100))? {
            chunks.push(chunk);
        }
    }

    assert_eq!(chunks.len(), 1);
    let chunk = &chunks[0];

    assert_eq!(&chunk.wav_bytes[0..4], b"RIFF");
    assert_eq!(&chunk.wav_bytes[8..12], b"WAVE");
    // 44-byte header + 10 frames of 16-bit samples
    assert_eq!(chunk.wav_bytes.len(), 44 + 10 * SAMPLES_PER_FRAME * 2);

    Ok(())
}

#[test]
fn test_flush_yields_partial_tail() -> Result<()> {
    let mut encoder = encoder(8000);

    for i in 0..4 {
        assert!(encoder.push(&frame(i * 100))?.is_none());
    }

    let tail = encoder.flush()?.expect("partial chunk should flush");
    assert_eq!(tail.sequence, 0);
    assert_eq!(tail.start_ms, 0);
    assert_eq!(tail.end_ms, 300);

    Ok(())
}

#[test]
fn test_flush_without_input_yields_nothing() -> Result<()> {
    let mut encoder = encoder(8000);

    assert!(encoder.flush()?.is_none());
    Ok(())
}

#[test]
fn test_chunk_source_follows_encoder() -> Result<()> {
    let config = EncoderConfig {
        chunk_duration_ms: 8000,
        sample_rate: 16000,
        channels: 1,
    };
    let mut encoder = ChunkEncoder::wav(AudioStreamSource::System, config);

    let mut system_frame = frame(0);
    system_frame.source = AudioStreamSource::System;
    encoder.push(&system_frame)?;

    let chunk = encoder.flush()?.expect("chunk");
    assert_eq!(chunk.source, AudioStreamSource::System);

    Ok(())
}

#[test]
fn test_encoder_config_default_duration() {
    let config = EncoderConfig::new(16000, 1);

    assert_eq!(config.chunk_duration_ms, 8000);
    assert_eq!(config.sample_rate, 16000);
    assert_eq!(config.channels, 1);
}

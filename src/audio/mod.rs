pub mod backend;
pub mod encoder;
pub mod scheduler;

pub use backend::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioStreamSource,
    CpalBackend, SimulatedBackend,
};
pub use encoder::{AudioChunk, ChunkEncoder, EncoderConfig, EncoderSession, WavEncoderSession};
pub use scheduler::spawn_chunk_lane;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info};

use super::backend::{AudioFrame, AudioStreamSource};
use super::encoder::{AudioChunk, ChunkEncoder};
use crate::session::SessionCounters;
use std::sync::Arc;

/// Spawns the chunk lane for one source.
///
/// Each lane is an independent periodic task: it drains the backend's frame
/// receiver through a `ChunkEncoder` and forwards every finished chunk to
/// the dispatcher channel. Lanes never synchronize with each other; chunk
/// boundaries between the microphone and system lanes are free to drift.
///
/// On shutdown the partial in-flight interval is flushed through the
/// dispatcher rather than dropped.
pub fn spawn_chunk_lane(
    source: AudioStreamSource,
    mut frames: mpsc::Receiver<AudioFrame>,
    mut encoder: ChunkEncoder,
    chunk_tx: mpsc::Sender<AudioChunk>,
    mut shutdown: watch::Receiver<bool>,
    counters: Arc<SessionCounters>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("{:?} chunk lane started", source);

        loop {
            tokio::select! {
                maybe_frame = frames.recv() => {
                    let Some(frame) = maybe_frame else { break };
                    match encoder.push(&frame) {
                        Ok(Some(chunk)) => {
                            counters.record_chunk();
                            if chunk_tx.send(chunk).await.is_err() {
                                // Dispatcher gone; nothing left to feed
                                break;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            error!("{:?} chunk encoding failed: {}", source, e);
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        // Flush the tail of the recording so stop never silently drops audio
        match encoder.flush() {
            Ok(Some(chunk)) => {
                counters.record_chunk();
                let _ = chunk_tx.send(chunk).await;
            }
            Ok(None) => {}
            Err(e) => {
                error!("{:?} final chunk flush failed: {}", source, e);
            }
        }

        info!("{:?} chunk lane stopped", source);
    })
}

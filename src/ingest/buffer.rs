use super::batch::{BatchPass, BatchReport};
use crate::config::IngestConfig;
use crate::error::{IngestError, Result};
use crate::events::{EventBus, SmartDoorEvent};
use crate::matcher::{CapturedFrame, FaceImage};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Ingest actor for the image feed
///
/// Owns the frame counter. Every payload takes the next slot, decoded or
/// not, and once `batch_size` slots are taken the counter resets and a batch
/// pass runs over the frames that did decode.
pub struct FrameIngest {
    batch_size: usize,
    frame_dir: PathBuf,
    counter: usize,
    slots: Vec<Option<CapturedFrame>>,
    pass: BatchPass,
    event_bus: Arc<EventBus>,
}

impl FrameIngest {
    pub fn new(config: &IngestConfig, pass: BatchPass, event_bus: Arc<EventBus>) -> Self {
        let batch_size = config.batch_size.max(1);
        Self {
            batch_size,
            frame_dir: PathBuf::from(&config.frame_dir),
            counter: 0,
            slots: vec![None; batch_size],
            pass,
            event_bus,
        }
    }

    /// Slots taken in the current cycle
    pub fn pending_frames(&self) -> usize {
        self.counter
    }

    pub fn frame_path(&self, slot: usize) -> PathBuf {
        self.frame_dir.join(format!("{}.jpg", slot))
    }

    /// Handle one image payload
    ///
    /// Returns the batch report when this payload completed a batch. Errors
    /// come only from the batch pass; the counter has already been reset by
    /// then.
    pub async fn accept(&mut self, payload: &[u8]) -> Result<Option<BatchReport>> {
        self.counter += 1;
        let slot = self.counter;

        let decoded = match self.store_frame(slot, payload).await {
            Ok(frame) => {
                self.slots[slot - 1] = Some(frame);
                true
            }
            Err(e) => {
                warn!("Error processing image: {}", e);
                self.slots[slot - 1] = None;
                false
            }
        };

        let _ = self
            .event_bus
            .publish(SmartDoorEvent::FrameReceived { slot, decoded })
            .await;

        if self.counter < self.batch_size {
            return Ok(None);
        }

        self.counter = 0;
        let frames: Vec<CapturedFrame> = self.slots.iter_mut().filter_map(Option::take).collect();
        self.pass.run(frames).await.map(Some)
    }

    /// Consume the queue until it closes or the token is cancelled
    pub async fn run(
        mut self,
        mut receiver: mpsc::Receiver<Bytes>,
        cancellation_token: CancellationToken,
    ) {
        info!("Frame ingest started (batch size {})", self.batch_size);

        loop {
            let payload = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                payload = receiver.recv() => match payload {
                    Some(payload) => payload,
                    None => break,
                },
            };

            match self.accept(&payload).await {
                Ok(Some(report)) => debug!(
                    "Batch {} finished with {} frames",
                    report.batch_id, report.frames
                ),
                Ok(None) => {}
                Err(e) => {
                    error!("Batch pass failed: {}", e);
                    let _ = self
                        .event_bus
                        .publish(SmartDoorEvent::SystemError {
                            component: "ingest".to_string(),
                            error: e.to_string(),
                        })
                        .await;
                }
            }
        }

        info!("Frame ingest stopped");
    }

    async fn store_frame(
        &self,
        slot: usize,
        payload: &[u8],
    ) -> std::result::Result<CapturedFrame, IngestError> {
        let path = self.frame_path(slot);

        let bytes = match decode_payload(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_stale(&path).await;
                return Err(e);
            }
        };

        fs::create_dir_all(&self.frame_dir)
            .await
            .map_err(|source| frame_write_error(&self.frame_dir, source))?;
        fs::write(&path, &bytes)
            .await
            .map_err(|source| frame_write_error(&path, source))?;
        info!("Image saved as {}", path.display());

        let image = FaceImage::decode(bytes).map_err(|source| IngestError::Image { slot, source })?;
        Ok(CapturedFrame { slot, image })
    }
}

/// Base64 body of an image payload; a `data:` URI prefix is tolerated
fn decode_payload(payload: &[u8]) -> std::result::Result<Vec<u8>, IngestError> {
    let text = String::from_utf8_lossy(payload);
    let text = text.trim();
    let body = match text.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((_, body)) => body,
        None => text,
    };
    Ok(STANDARD.decode(body)?)
}

async fn remove_stale(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!("Removed stale frame {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove stale frame {}: {}", path.display(), e),
    }
}

fn frame_write_error(path: &Path, source: std::io::Error) -> IngestError {
    IngestError::FrameWrite {
        path: path.display().to_string(),
        source,
    }
}

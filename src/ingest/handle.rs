use crate::error::IngestError;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Sending side of the ingest queue
#[derive(Clone)]
pub struct IngestHandle {
    sender: mpsc::Sender<Bytes>,
}

impl IngestHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a raw image payload; waits while the queue is full
    pub async fn submit(&self, payload: Bytes) -> Result<(), IngestError> {
        self.sender
            .send(payload)
            .await
            .map_err(|_| IngestError::QueueClosed)
    }
}

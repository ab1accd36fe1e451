use super::feeds::Feed;
use crate::events::{EventBus, SmartDoorEvent};
use crate::ingest::IngestHandle;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{error, info};

/// Routes inbound broker messages by feed
///
/// Image payloads are queued for the ingest actor in arrival order. Every
/// other feed is informational and only logged.
#[derive(Clone)]
pub struct FeedRouter {
    ingest: IngestHandle,
    event_bus: Arc<EventBus>,
}

impl FeedRouter {
    pub fn new(ingest: IngestHandle, event_bus: Arc<EventBus>) -> Self {
        Self { ingest, event_bus }
    }

    pub async fn dispatch(&self, feed: Feed, payload: Bytes) {
        if feed == Feed::Image {
            if let Err(e) = self.ingest.submit(payload).await {
                error!("Dropping image payload: {}", e);
            }
            return;
        }

        let text = String::from_utf8_lossy(&payload).into_owned();
        match feed {
            Feed::Door => info!("Door command received: {}", text),
            Feed::Light => info!("Light command received: {}", text),
            Feed::Led => info!("LED command received: {}", text),
            Feed::Button => info!("Button event received: {}", text),
            _ => info!("Message received on feed '{}': {}", feed, text),
        }

        let _ = self
            .event_bus
            .publish(SmartDoorEvent::FeedMessage {
                feed: feed.to_string(),
                payload: text,
            })
            .await;
    }
}

use super::feeds::{Feed, FeedSet};
use crate::error::BrokerError;
use async_trait::async_trait;
use rumqttc::{AsyncClient, QoS};
use std::sync::Arc;
use tracing::{error, info};

/// Fire-and-forget publishing onto named feeds
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    async fn publish(&self, feed: Feed, payload: &str) -> Result<(), BrokerError>;
}

/// Publish and swallow the error; returns whether the send was accepted
pub async fn publish_logged(publisher: &dyn FeedPublisher, feed: Feed, payload: &str) -> bool {
    match publisher.publish(feed, payload).await {
        Ok(()) => {
            info!("Data sent to feed '{}': {}", feed, payload);
            true
        }
        Err(e) => {
            error!("Failed to send data to broker: {}", e);
            false
        }
    }
}

/// Publisher half of the MQTT bridge
#[derive(Clone)]
pub struct MqttPublisher {
    client: AsyncClient,
    feeds: Arc<FeedSet>,
}

impl MqttPublisher {
    pub(crate) fn new(client: AsyncClient, feeds: Arc<FeedSet>) -> Self {
        Self { client, feeds }
    }
}

#[async_trait]
impl FeedPublisher for MqttPublisher {
    async fn publish(&self, feed: Feed, payload: &str) -> Result<(), BrokerError> {
        let topic = self.feeds.topic(feed);
        // Never wait on the event loop: it may itself be blocked handing an
        // image to ingest, whose batch pass is the caller here
        self.client
            .try_publish(topic, QoS::AtLeastOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| BrokerError::PublishFailed {
                feed: feed.to_string(),
                details: e.to_string(),
            })
    }
}

use super::feeds::Feed;
use super::publisher::FeedPublisher;
use crate::error::BrokerError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;

/// In-memory publisher for running without a broker
///
/// Records every accepted publish in order. Feeds marked with
/// [`RecordingPublisher::fail_feed`] reject publishes instead.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<(Feed, String)>>,
    failing: Mutex<HashSet<Feed>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_feed(&self, feed: Feed) {
        self.failing.lock().insert(feed);
    }

    pub fn published(&self) -> Vec<(Feed, String)> {
        self.published.lock().clone()
    }

    pub fn payloads_for(&self, feed: Feed) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .filter(|(published, _)| *published == feed)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

#[async_trait]
impl FeedPublisher for RecordingPublisher {
    async fn publish(&self, feed: Feed, payload: &str) -> Result<(), BrokerError> {
        if self.failing.lock().contains(&feed) {
            return Err(BrokerError::PublishFailed {
                feed: feed.to_string(),
                details: "mock failure".to_string(),
            });
        }

        debug!("Mock publish to {}: {}", feed, payload);
        self.published.lock().push((feed, payload.to_string()));
        Ok(())
    }
}

mod bridge;
mod feeds;
mod mock;
mod publisher;
mod router;
#[cfg(test)]
mod tests;

pub use bridge::BrokerBridge;
pub use feeds::{Feed, FeedSet, COMMAND_OFF, COMMAND_ON};
pub use mock::RecordingPublisher;
pub use publisher::{publish_logged, FeedPublisher, MqttPublisher};
pub use router::FeedRouter;

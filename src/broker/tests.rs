use super::*;
use crate::config::{BrokerConfig, SmartDoorConfig};
use crate::events::{EventBus, EventFilter, SmartDoorEvent};
use crate::ingest::IngestHandle;
use bytes::Bytes;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

fn test_feeds() -> FeedSet {
    FeedSet::new("alice", SmartDoorConfig::default().feeds)
}

fn offline_broker() -> BrokerConfig {
    BrokerConfig {
        host: "127.0.0.1".to_string(),
        port: 1,
        reconnect_delay_seconds: 1,
        ..SmartDoorConfig::default().broker
    }
}

#[test]
fn test_topic_naming() {
    let feeds = test_feeds();

    assert_eq!(feeds.topic(Feed::Door), "alice/feeds/project-242.door");
    assert_eq!(feeds.topic(Feed::Status), "alice/feeds/project-242.name");
    assert_eq!(feeds.key(Feed::Image), "project-242.image");
}

#[test]
fn test_resolve_topic() {
    let feeds = test_feeds();

    for feed in Feed::ALL {
        assert_eq!(feeds.resolve(&feeds.topic(feed)), Some(feed));
    }
    assert_eq!(
        feeds.resolve("alice/f/project-242.light"),
        Some(Feed::Light)
    );
    assert_eq!(feeds.resolve("bob/feeds/project-242.door"), None);
    assert_eq!(feeds.resolve("alice/feeds/other"), None);
    assert_eq!(feeds.resolve("alice/errors"), None);
}

#[tokio::test]
async fn test_publish_logged_swallows_failures() {
    let publisher = RecordingPublisher::new();
    publisher.fail_feed(Feed::Door);

    assert!(!publish_logged(&publisher, Feed::Door, COMMAND_ON).await);
    assert!(publish_logged(&publisher, Feed::Status, "Alice").await);

    assert_eq!(
        publisher.published(),
        vec![(Feed::Status, "Alice".to_string())]
    );
    assert!(publisher.payloads_for(Feed::Door).is_empty());
}

#[tokio::test]
async fn test_router_queues_image_payloads() {
    let event_bus = Arc::new(EventBus::new(16));
    let (handle, mut receiver) = IngestHandle::channel(4);
    let router = FeedRouter::new(handle, Arc::clone(&event_bus));

    router.dispatch(Feed::Image, Bytes::from_static(b"frame-1")).await;
    router.dispatch(Feed::Image, Bytes::from_static(b"frame-2")).await;

    assert_eq!(receiver.recv().await.unwrap(), Bytes::from_static(b"frame-1"));
    assert_eq!(receiver.recv().await.unwrap(), Bytes::from_static(b"frame-2"));
}

#[tokio::test]
async fn test_router_reports_command_feeds() {
    let event_bus = Arc::new(EventBus::new(16));
    let mut events = event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["feed_message"]),
        "test",
    );
    let (handle, mut receiver) = IngestHandle::channel(4);
    let router = FeedRouter::new(handle, Arc::clone(&event_bus));

    router.dispatch(Feed::Door, Bytes::from_static(b"ON")).await;

    match events.recv().await.unwrap() {
        SmartDoorEvent::FeedMessage { feed, payload } => {
            assert_eq!(feed, "door");
            assert_eq!(payload, "ON");
        }
        other => panic!("Unexpected event: {:?}", other),
    }
    assert!(receiver.try_recv().is_err());
}

#[tokio::test]
async fn test_subscriptions_recorded_before_connect() {
    let bridge = BrokerBridge::new(
        &offline_broker(),
        test_feeds(),
        Arc::new(EventBus::new(16)),
    );

    bridge.subscribe(Feed::Image).unwrap();
    bridge.subscribe(Feed::Door).unwrap();
    bridge.subscribe(Feed::Image).unwrap();

    assert_eq!(bridge.subscriptions(), vec![Feed::Image, Feed::Door]);
    assert!(!bridge.is_connected());
}

#[tokio::test]
async fn test_connect_only_once_and_stops_on_cancel() {
    let event_bus = Arc::new(EventBus::new(16));
    let mut bridge = BrokerBridge::new(&offline_broker(), test_feeds(), Arc::clone(&event_bus));
    let (handle, _receiver) = IngestHandle::channel(4);
    let router = FeedRouter::new(handle, Arc::clone(&event_bus));
    let token = CancellationToken::new();

    let task = bridge.connect(router.clone(), token.clone()).unwrap();
    assert!(matches!(
        bridge.connect(router, token.clone()),
        Err(crate::error::BrokerError::AlreadyConnected)
    ));

    token.cancel();
    timeout(Duration::from_secs(5), task)
        .await
        .expect("event loop should stop after cancellation")
        .unwrap();
    assert!(!bridge.is_connected());
}

#[tokio::test]
async fn test_publish_fails_fast_when_request_queue_is_full() {
    let options = rumqttc::MqttOptions::new("smartdoor-test", "127.0.0.1", 1);
    // Event loop kept alive but never polled, as when it is blocked on ingest
    let (client, _eventloop) = rumqttc::AsyncClient::new(options, 1);
    let publisher = MqttPublisher::new(client, Arc::new(test_feeds()));

    publisher.publish(Feed::Door, COMMAND_ON).await.unwrap();

    let second = timeout(Duration::from_secs(1), publisher.publish(Feed::Status, "Alice"))
        .await
        .expect("publish must not wait for the event loop");
    assert!(matches!(
        second,
        Err(crate::error::BrokerError::PublishFailed { .. })
    ));

    let logged = timeout(
        Duration::from_secs(1),
        publish_logged(&publisher, Feed::Status, "Unknown Person"),
    )
    .await
    .unwrap();
    assert!(!logged);
}

use super::feeds::{Feed, FeedSet};
use super::publisher::MqttPublisher;
use super::router::FeedRouter;
use crate::config::BrokerConfig;
use crate::error::BrokerError;
use crate::events::{EventBus, SmartDoorEvent};
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Base64 camera frames are far larger than rumqttc's default packet limit
const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Connection to the message broker
///
/// The bridge owns the MQTT client and its event loop. Subscriptions are kept
/// in a list and re-issued on every connection acknowledgement, so they
/// survive reconnects.
pub struct BrokerBridge {
    client: AsyncClient,
    event_loop: Option<EventLoop>,
    feeds: Arc<FeedSet>,
    subscriptions: Arc<Mutex<Vec<Feed>>>,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
    event_bus: Arc<EventBus>,
}

impl BrokerBridge {
    pub fn new(config: &BrokerConfig, feeds: FeedSet, event_bus: Arc<EventBus>) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_seconds.max(5)));
        options.set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE);
        if !config.username.is_empty() {
            options.set_credentials(&config.username, &config.key);
        }
        if config.use_tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity.max(1));

        Self {
            client,
            event_loop: Some(event_loop),
            feeds: Arc::new(feeds),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicBool::new(false)),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_seconds),
            event_bus,
        }
    }

    pub fn publisher(&self) -> MqttPublisher {
        MqttPublisher::new(self.client.clone(), Arc::clone(&self.feeds))
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn subscriptions(&self) -> Vec<Feed> {
        self.subscriptions.lock().clone()
    }

    /// Register interest in a feed
    ///
    /// The subscription is sent immediately when connected and again after
    /// every reconnect.
    pub fn subscribe(&self, feed: Feed) -> Result<(), BrokerError> {
        {
            let mut subscriptions = self.subscriptions.lock();
            if !subscriptions.contains(&feed) {
                subscriptions.push(feed);
            }
        }

        if self.is_connected() {
            self.client
                .try_subscribe(self.feeds.topic(feed), QoS::AtLeastOnce)
                .map_err(|e| BrokerError::SubscribeFailed {
                    feed: feed.to_string(),
                    details: e.to_string(),
                })?;
        }

        info!("Subscribed to feed '{}'", self.feeds.key(feed));
        Ok(())
    }

    /// Start the event loop task; inbound messages go to `router`
    pub fn connect(
        &mut self,
        router: FeedRouter,
        cancellation_token: CancellationToken,
    ) -> Result<JoinHandle<()>, BrokerError> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or(BrokerError::AlreadyConnected)?;

        let session = Session {
            client: self.client.clone(),
            feeds: Arc::clone(&self.feeds),
            subscriptions: Arc::clone(&self.subscriptions),
            connected: Arc::clone(&self.connected),
            reconnect_delay: self.reconnect_delay,
            event_bus: Arc::clone(&self.event_bus),
            router,
        };

        Ok(tokio::spawn(session.run(event_loop, cancellation_token)))
    }

    pub async fn disconnect(&self) {
        if !self.is_connected() {
            return;
        }
        if let Err(e) = self.client.disconnect().await {
            debug!("Broker disconnect request failed: {}", e);
        }
    }
}

struct Session {
    client: AsyncClient,
    feeds: Arc<FeedSet>,
    subscriptions: Arc<Mutex<Vec<Feed>>>,
    connected: Arc<AtomicBool>,
    reconnect_delay: Duration,
    event_bus: Arc<EventBus>,
    router: FeedRouter,
}

impl Session {
    async fn run(self, mut event_loop: EventLoop, cancellation_token: CancellationToken) {
        info!("Broker event loop started");

        loop {
            let event = tokio::select! {
                _ = cancellation_token.cancelled() => break,
                event = event_loop.poll() => event,
            };

            match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => self.on_connected().await,
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match self.feeds.resolve(&publish.topic) {
                        Some(feed) => self.router.dispatch(feed, publish.payload).await,
                        None => debug!("Ignoring message on topic {}", publish.topic),
                    }
                }
                Ok(Event::Incoming(Packet::SubAck(ack))) => {
                    debug!("Subscription acknowledged (pkid {})", ack.pkid);
                }
                Ok(_) => {}
                Err(e) => {
                    if self.connected.swap(false, Ordering::SeqCst) {
                        warn!("Disconnected from broker: {}", e);
                        self.publish_status(false).await;
                    } else {
                        error!("Broker connection failed: {}", e);
                    }

                    tokio::select! {
                        _ = cancellation_token.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {
                            debug!("Reconnecting to broker");
                        }
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        info!("Broker event loop stopped");
    }

    async fn on_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        self.publish_status(true).await;

        let feeds: Vec<Feed> = self.subscriptions.lock().clone();
        for feed in feeds {
            if let Err(e) = self
                .client
                .try_subscribe(self.feeds.topic(feed), QoS::AtLeastOnce)
            {
                warn!("Failed to subscribe to feed '{}': {}", self.feeds.key(feed), e);
            }
        }
    }

    async fn publish_status(&self, connected: bool) {
        let _ = self
            .event_bus
            .publish(SmartDoorEvent::BrokerStatusChanged {
                connected,
                timestamp: SystemTime::now(),
            })
            .await;
    }
}

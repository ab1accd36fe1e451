use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events that can occur in the smartdoor system
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SmartDoorEvent {
    /// Broker connection status changed
    BrokerStatusChanged {
        connected: bool,
        timestamp: SystemTime,
    },
    /// A command or value arrived on a non-image feed
    FeedMessage { feed: String, payload: String },
    /// An image payload occupied a batch slot
    FrameReceived { slot: usize, decoded: bool },
    /// A batch pass finished
    BatchCompleted {
        batch_id: String,
        matched: Option<String>,
    },
    /// The door was opened for a verified identity
    DoorOpened {
        name: String,
        user_id: i64,
        timestamp: SystemTime,
    },
    /// No enrolled identity matched the batch
    UnknownPerson { timestamp: SystemTime },
    /// A manual control command was published
    ControlSent {
        control_id: i64,
        device_type: String,
        action: String,
    },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
    /// System shutdown requested
    ShutdownRequested {
        timestamp: SystemTime,
        reason: String,
    },
}

impl SmartDoorEvent {
    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            SmartDoorEvent::BrokerStatusChanged { connected, .. } => format!(
                "Broker {}",
                if *connected {
                    "connected"
                } else {
                    "disconnected"
                }
            ),
            SmartDoorEvent::FeedMessage { feed, payload } => {
                format!("Feed {}: {}", feed, payload)
            }
            SmartDoorEvent::FrameReceived { slot, decoded } => {
                format!(
                    "Frame slot {} {}",
                    slot,
                    if *decoded { "filled" } else { "corrupt" }
                )
            }
            SmartDoorEvent::BatchCompleted { batch_id, matched } => match matched {
                Some(name) => format!("Batch {} matched {}", batch_id, name),
                None => format!("Batch {} unmatched", batch_id),
            },
            SmartDoorEvent::DoorOpened { name, user_id, .. } => {
                format!("Door opened for {} (user {})", name, user_id)
            }
            SmartDoorEvent::UnknownPerson { .. } => "Unknown person at the door".to_string(),
            SmartDoorEvent::ControlSent {
                control_id,
                device_type,
                action,
            } => format!(
                "Control {} sent: {} on {}",
                control_id, action, device_type
            ),
            SmartDoorEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
            SmartDoorEvent::ShutdownRequested { reason, .. } => {
                format!("Shutdown requested: {}", reason)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            SmartDoorEvent::BrokerStatusChanged { .. } => "broker_status_changed",
            SmartDoorEvent::FeedMessage { .. } => "feed_message",
            SmartDoorEvent::FrameReceived { .. } => "frame_received",
            SmartDoorEvent::BatchCompleted { .. } => "batch_completed",
            SmartDoorEvent::DoorOpened { .. } => "door_opened",
            SmartDoorEvent::UnknownPerson { .. } => "unknown_person",
            SmartDoorEvent::ControlSent { .. } => "control_sent",
            SmartDoorEvent::SystemError { .. } => "system_error",
            SmartDoorEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }
}

impl fmt::Display for SmartDoorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Event bus errors
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event publish failed: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SmartDoorEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<SmartDoorEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter and a name used in logs
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers
    ///
    /// Having no subscribers is not an error; the event is dropped and 0 is
    /// returned.
    pub async fn publish(&self, event: SmartDoorEvent) -> Result<usize, EventBusError> {
        match &event {
            SmartDoorEvent::DoorOpened { name, .. } => {
                info!("Door opened for {}", name);
            }
            SmartDoorEvent::UnknownPerson { .. } => {
                info!("Unknown person recorded");
            }
            SmartDoorEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            SmartDoorEvent::BrokerStatusChanged { connected, .. } => {
                if *connected {
                    info!("Broker connected");
                } else {
                    warn!("Broker disconnected");
                }
            }
            SmartDoorEvent::ShutdownRequested { reason, .. } => {
                info!("Shutdown requested: {}", reason);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        if self.sender.receiver_count() == 0 {
            return Ok(0);
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &SmartDoorEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<SmartDoorEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    /// Create a new event receiver with a filter
    pub fn new(
        receiver: broadcast::Receiver<SmartDoorEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<SmartDoorEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::Lagged { skipped: n });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

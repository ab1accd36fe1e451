use crate::events::{EventBus, EventBusError, EventFilter, SmartDoorEvent};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Counters derived from the event bus
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsSnapshot {
    pub broker_connected: bool,
    pub frames_received: u64,
    pub corrupt_frames: u64,
    pub batches: u64,
    pub doors_opened: u64,
    pub unknown_persons: u64,
    pub controls_sent: u64,
    pub feed_messages: u64,
    pub errors: u64,
    pub last_event_time: Option<SystemTime>,
}

/// Shared runtime statistics, fed by a bus subscriber
#[derive(Debug, Clone, Default)]
pub struct RuntimeStats {
    inner: Arc<RwLock<StatsSnapshot>>,
}

impl RuntimeStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the counters
    pub fn record(&self, event: &SmartDoorEvent) {
        let mut stats = self.inner.write();
        stats.last_event_time = Some(SystemTime::now());

        match event {
            SmartDoorEvent::BrokerStatusChanged { connected, .. } => {
                stats.broker_connected = *connected;
            }
            SmartDoorEvent::FeedMessage { .. } => stats.feed_messages += 1,
            SmartDoorEvent::FrameReceived { decoded, .. } => {
                stats.frames_received += 1;
                if !decoded {
                    stats.corrupt_frames += 1;
                }
            }
            SmartDoorEvent::BatchCompleted { .. } => stats.batches += 1,
            SmartDoorEvent::DoorOpened { .. } => stats.doors_opened += 1,
            SmartDoorEvent::UnknownPerson { .. } => stats.unknown_persons += 1,
            SmartDoorEvent::ControlSent { .. } => stats.controls_sent += 1,
            SmartDoorEvent::SystemError { .. } => stats.errors += 1,
            SmartDoorEvent::ShutdownRequested { .. } => {}
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.inner.read().clone()
    }

    /// Subscribe to the bus and keep the counters current until cancelled
    pub fn spawn_collector(
        &self,
        event_bus: &EventBus,
        cancellation_token: CancellationToken,
    ) -> JoinHandle<()> {
        let stats = self.clone();
        let mut receiver = event_bus.subscribe_filtered(EventFilter::All, "stats");

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancellation_token.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(event) => stats.record(&event),
                        Err(EventBusError::Lagged { skipped }) => {
                            warn!("Statistics collector skipped {} events", skipped);
                        }
                        Err(_) => break,
                    }
                }
            }
            debug!("Statistics collector stopped");
        })
    }
}

use super::types::{ComponentStates, ShutdownReason};
use crate::actuation::Actuator;
use crate::broker::{BrokerBridge, FeedPublisher, FeedSet};
use crate::config::SmartDoorConfig;
use crate::control::ControlService;
use crate::error::Result;
use crate::events::EventBus;
#[cfg(feature = "http")]
use crate::http::{HttpServer, HttpServerBuilder};
use crate::ingest::{BatchPass, FrameIngest, IngestHandle};
use crate::matcher::{DeepFaceVerifier, FaceMatcher};
use crate::stats::RuntimeStats;
use crate::storage::AccessStore;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Main application coordinator that manages all system components
pub struct SmartDoorOrchestrator {
    pub(super) config: SmartDoorConfig,
    pub(super) event_bus: Arc<EventBus>,
    pub(super) stats: RuntimeStats,
    pub(super) store: AccessStore,

    // Components
    pub(super) bridge: BrokerBridge,
    pub(super) ingest: Option<(FrameIngest, mpsc::Receiver<Bytes>)>,
    pub(super) ingest_handle: IngestHandle,
    pub(super) control: Arc<ControlService>,
    #[cfg(feature = "http")]
    pub(super) http_server: Option<HttpServer>,
    pub(super) tasks: HashMap<&'static str, JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: ComponentStates,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl SmartDoorOrchestrator {
    /// Create a new orchestrator with the given configuration
    ///
    /// Opens the database and wires the components; nothing touches the
    /// network until [`start`](Self::start).
    pub async fn new(config: SmartDoorConfig) -> Result<Self> {
        let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
        let stats = RuntimeStats::new();
        let component_states = ComponentStates::default();
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let store = AccessStore::open(&config.storage.database_path, config.timezone())?;
        info!("Database ready at {}", config.storage.database_path);

        let bridge = BrokerBridge::new(
            &config.broker,
            FeedSet::new(&config.broker.username, config.feeds.clone()),
            Arc::clone(&event_bus),
        );
        let publisher: Arc<dyn FeedPublisher> = Arc::new(bridge.publisher());

        // Recognition pipeline: ingest -> matcher -> actuator
        let verifier = Arc::new(DeepFaceVerifier::new(&config.matcher)?);
        let actuator = Actuator::new(
            Arc::clone(&publisher),
            store.clone(),
            config.actuation.clone(),
            Arc::clone(&event_bus),
        );
        let pass = BatchPass::new(
            store.clone(),
            FaceMatcher::new(verifier),
            actuator,
            Arc::clone(&event_bus),
        );
        let frame_ingest = FrameIngest::new(&config.ingest, pass, Arc::clone(&event_bus));
        let (ingest_handle, ingest_receiver) = IngestHandle::channel(config.ingest.queue_capacity);

        let control = Arc::new(ControlService::new(
            store.clone(),
            publisher,
            Arc::clone(&event_bus),
        ));

        #[cfg(feature = "http")]
        let http_server = if config.http.enabled {
            Some(
                HttpServerBuilder::new()
                    .config(config.http.clone())
                    .store(store.clone())
                    .control(Arc::clone(&control))
                    .stats(stats.clone())
                    .component_states(Arc::clone(&component_states))
                    .event_bus(Arc::clone(&event_bus))
                    .build()?,
            )
        } else {
            None
        };

        Ok(Self {
            config,
            event_bus,
            stats,
            store,
            bridge,
            ingest: Some((frame_ingest, ingest_receiver)),
            ingest_handle,
            control,
            #[cfg(feature = "http")]
            http_server,
            tasks: HashMap::new(),
            component_states,
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats.clone()
    }

    pub fn store(&self) -> &AccessStore {
        &self.store
    }

    pub fn control(&self) -> Arc<ControlService> {
        Arc::clone(&self.control)
    }

    pub fn is_broker_connected(&self) -> bool {
        self.bridge.is_connected()
    }
}

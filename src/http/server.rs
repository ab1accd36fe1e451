use super::handlers::{create_control, health, latest_open_door_logs, list_controls};
use crate::app::ComponentStates;
use crate::config::HttpConfig;
use crate::control::ControlService;
use crate::error::{HttpError, Result, SmartDoorError};
use crate::events::EventBus;
use crate::stats::RuntimeStats;
use crate::storage::AccessStore;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared state for the Axum server
#[derive(Clone)]
pub struct ServerState {
    pub(crate) store: AccessStore,
    pub(crate) control: Arc<ControlService>,
    pub(crate) stats: RuntimeStats,
    pub(crate) component_states: ComponentStates,
    pub(crate) event_bus: Arc<EventBus>,
    pub(crate) latest_logs_limit: usize,
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/open_door_logs/latest", get(latest_open_door_logs))
        .route("/controls", get(list_controls).post(create_control))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// HTTP server for audit history and manual device control
pub struct HttpServer {
    pub(crate) config: HttpConfig,
    pub(crate) state: ServerState,
}

impl HttpServer {
    /// Bind the listener, then serve on a background task until cancelled
    pub async fn start(&self, cancellation_token: CancellationToken) -> Result<JoinHandle<()>> {
        let addr = format!("{}:{}", self.config.ip, self.config.port);
        let listener =
            tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|e| HttpError::BindFailed {
                    address: addr.clone(),
                    source: e,
                })?;

        info!("HTTP server listening on {}", addr);

        let app = router(self.state.clone());
        Ok(tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(cancellation_token.cancelled_owned())
                .await;
            match served {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => error!("HTTP server error: {}", e),
            }
        }))
    }
}

/// HTTP server builder
pub struct HttpServerBuilder {
    config: Option<HttpConfig>,
    store: Option<AccessStore>,
    control: Option<Arc<ControlService>>,
    stats: Option<RuntimeStats>,
    component_states: Option<ComponentStates>,
    event_bus: Option<Arc<EventBus>>,
}

impl HttpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            store: None,
            control: None,
            stats: None,
            component_states: None,
            event_bus: None,
        }
    }

    pub fn config(mut self, config: HttpConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store(mut self, store: AccessStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn control(mut self, control: Arc<ControlService>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn stats(mut self, stats: RuntimeStats) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn component_states(mut self, component_states: ComponentStates) -> Self {
        self.component_states = Some(component_states);
        self
    }

    pub fn event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn build(self) -> Result<HttpServer> {
        let config = self.config.ok_or_else(|| missing("HTTP configuration"))?;
        let store = self.store.ok_or_else(|| missing("Access store"))?;
        let control = self.control.ok_or_else(|| missing("Control service"))?;
        let event_bus = self.event_bus.ok_or_else(|| missing("Event bus"))?;

        let state = ServerState {
            store,
            control,
            stats: self.stats.unwrap_or_default(),
            component_states: self.component_states.unwrap_or_default(),
            event_bus,
            latest_logs_limit: config.latest_logs_limit,
        };

        Ok(HttpServer { config, state })
    }
}

impl Default for HttpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn missing(what: &str) -> SmartDoorError {
    SmartDoorError::Http(HttpError::ServerFailed {
        details: format!("{} is required", what),
    })
}

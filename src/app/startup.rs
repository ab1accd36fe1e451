use super::{ComponentState, SmartDoorOrchestrator};
use crate::broker::{Feed, FeedRouter};
use crate::error::{Result, SmartDoorError};
use std::sync::Arc;
use tracing::{error, info};

impl SmartDoorOrchestrator {
    /// Initialize all system components
    pub async fn initialize(&mut self) -> Result<()> {
        info!("Initializing smartdoor system components");

        let mut states = self.component_states.lock().await;
        states.insert("storage".to_string(), ComponentState::Stopped);
        states.insert("stats".to_string(), ComponentState::Stopped);
        states.insert("ingest".to_string(), ComponentState::Stopped);
        states.insert("broker".to_string(), ComponentState::Stopped);

        #[cfg(feature = "http")]
        if self.http_server.is_some() {
            states.insert("http".to_string(), ComponentState::Stopped);
        }

        drop(states);

        info!("All components initialized successfully");
        Ok(())
    }

    /// Start all system components
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting smartdoor system");

        // The store was opened in new(); mark it live
        self.set_component_state("storage", ComponentState::Running)
            .await;

        self.set_component_state("stats", ComponentState::Starting)
            .await;
        let collector = self
            .stats
            .spawn_collector(&self.event_bus, self.cancellation_token.clone());
        self.tasks.insert("stats", collector);
        self.set_component_state("stats", ComponentState::Running)
            .await;

        // Ingest must be consuming before the broker delivers frames
        self.set_component_state("ingest", ComponentState::Starting)
            .await;
        let Some((frame_ingest, receiver)) = self.ingest.take() else {
            self.set_component_state("ingest", ComponentState::Failed)
                .await;
            return Err(SmartDoorError::component("ingest", "already started"));
        };
        let ingest_task = tokio::spawn(frame_ingest.run(receiver, self.cancellation_token.clone()));
        self.tasks.insert("ingest", ingest_task);
        self.set_component_state("ingest", ComponentState::Running)
            .await;
        info!("Frame ingest started successfully");

        self.set_component_state("broker", ComponentState::Starting)
            .await;
        for feed in Feed::ALL {
            self.bridge.subscribe(feed)?;
        }
        let router = FeedRouter::new(self.ingest_handle.clone(), Arc::clone(&self.event_bus));
        match self
            .bridge
            .connect(router, self.cancellation_token.clone())
        {
            Ok(broker_task) => {
                self.tasks.insert("broker", broker_task);
                self.set_component_state("broker", ComponentState::Running)
                    .await;
                info!(
                    "Broker bridge started for {}:{}",
                    self.config.broker.host, self.config.broker.port
                );
            }
            Err(e) => {
                error!("Failed to start broker bridge: {}", e);
                self.set_component_state("broker", ComponentState::Failed)
                    .await;
                return Err(e.into());
            }
        }

        #[cfg(feature = "http")]
        if let Some(server) = &self.http_server {
            self.set_component_state("http", ComponentState::Starting)
                .await;
            match server.start(self.cancellation_token.clone()).await {
                Ok(http_task) => {
                    self.tasks.insert("http", http_task);
                    self.set_component_state("http", ComponentState::Running)
                        .await;
                }
                Err(e) => {
                    error!("Failed to start HTTP server: {}", e);
                    self.set_component_state("http", ComponentState::Failed)
                        .await;
                    return Err(e);
                }
            }
        }

        info!("Smartdoor system started successfully");
        Ok(())
    }
}

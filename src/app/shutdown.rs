use super::{ComponentState, SmartDoorOrchestrator};
use crate::error::{Result, SmartDoorError};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

const STOP_TIMEOUT: Duration = Duration::from_secs(10);

impl SmartDoorOrchestrator {
    /// Perform graceful shutdown of all components
    pub async fn shutdown(&mut self) -> Result<i32> {
        info!("Beginning graceful shutdown");

        // Let the broker see a clean disconnect before the event loop stops
        self.bridge.disconnect().await;

        // Cancel all background tasks
        self.cancellation_token.cancel();

        let mut exit_code = 0;

        // Stop components in reverse dependency order
        for component in ["http", "broker", "ingest", "stats", "storage"] {
            if let Err(e) = self.stop_component(component).await {
                error!("Error stopping {}: {}", component, e);
                exit_code = 1;
            }
        }

        info!("Graceful shutdown completed with exit code: {}", exit_code);
        Ok(exit_code)
    }

    /// Wait for a component's task to finish after cancellation
    async fn stop_component(&mut self, component: &'static str) -> Result<()> {
        let registered = self.get_component_state(component).await.is_some();
        let Some(handle) = self.tasks.remove(component) else {
            if registered {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
            }
            return Ok(());
        };

        info!("Stopping {} component", component);
        self.set_component_state(component, ComponentState::Stopping)
            .await;

        match timeout(STOP_TIMEOUT, handle).await {
            Ok(Ok(())) => {
                self.set_component_state(component, ComponentState::Stopped)
                    .await;
                info!("{} component stopped", component);
                Ok(())
            }
            Ok(Err(e)) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                Err(SmartDoorError::component(component.to_string(), e.to_string()))
            }
            Err(_) => {
                self.set_component_state(component, ComponentState::Failed)
                    .await;
                error!("{} component stop timeout", component);
                Err(SmartDoorError::system(format!(
                    "{} component stop timeout",
                    component
                )))
            }
        }
    }
}

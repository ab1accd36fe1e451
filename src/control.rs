use crate::broker::{Feed, FeedPublisher, COMMAND_OFF, COMMAND_ON};
use crate::error::{ControlError, Result, StorageError};
use crate::events::{EventBus, SmartDoorEvent};
use crate::storage::{AccessStore, ControlRecord, NewControl};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// A manual device command as submitted by a user
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlRequest {
    pub action: Option<String>,
    pub device_type: Option<String>,
    pub device_id: Option<i64>,
    pub equipment_id: Option<i64>,
}

/// Feed and payload for a device command
pub fn command_for(
    device_type: &str,
    action: &str,
) -> std::result::Result<(Feed, &'static str), ControlError> {
    let feed = match device_type {
        "door" => Feed::Door,
        "light" => Feed::Light,
        other => {
            return Err(ControlError::UnsupportedDevice {
                device_type: other.to_string(),
            })
        }
    };

    let command = match action {
        "Open" | "Turn on" => COMMAND_ON,
        _ => COMMAND_OFF,
    };
    Ok((feed, command))
}

/// Publishes user-issued device commands and keeps their history
pub struct ControlService {
    store: AccessStore,
    publisher: Arc<dyn FeedPublisher>,
    event_bus: Arc<EventBus>,
}

impl ControlService {
    pub fn new(
        store: AccessStore,
        publisher: Arc<dyn FeedPublisher>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            publisher,
            event_bus,
        }
    }

    /// Publish the command, then record it as sent
    ///
    /// Nothing is stored when the publish fails.
    pub async fn send(&self, user_id: i64, request: ControlRequest) -> Result<ControlRecord> {
        let (action, device_type, device_id) =
            match (request.action, request.device_type, request.device_id) {
                (Some(action), Some(device_type), Some(device_id))
                    if !action.is_empty() && !device_type.is_empty() && device_id != 0 =>
                {
                    (action, device_type, device_id)
                }
                _ => return Err(ControlError::MissingField.into()),
            };
        let (feed, command) = command_for(&device_type, &action)?;

        let exists = self
            .store
            .run_blocking(move |store| store.get_user(user_id))
            .await?
            .is_some();
        if !exists {
            return Err(StorageError::UserNotFound { user_id }.into());
        }

        self.publisher
            .publish(feed, command)
            .await
            .map_err(ControlError::SendFailed)?;
        info!("Data sent to feed '{}': {}", feed, command);

        let control = NewControl {
            action,
            device_type,
            device_id,
            status: Some("sent".to_string()),
            user_id,
            equipment_id: request.equipment_id,
        };
        let record = self
            .store
            .run_blocking(move |store| store.insert_control(&control))
            .await?;

        let _ = self
            .event_bus
            .publish(SmartDoorEvent::ControlSent {
                control_id: record.id,
                device_type: record.device_type.clone(),
                action: record.action.clone(),
            })
            .await;

        Ok(record)
    }

    pub async fn list(&self, user_id: i64) -> Result<Vec<ControlRecord>> {
        Ok(self
            .store
            .run_blocking(move |store| store.list_controls(user_id))
            .await?)
    }
}

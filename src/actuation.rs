use crate::broker::{publish_logged, Feed, FeedPublisher, COMMAND_ON};
use crate::config::ActuationConfig;
use crate::error::StorageError;
use crate::events::{EventBus, SmartDoorEvent};
use crate::matcher::MatchResult;
use crate::storage::{AccessStore, AuditRecord, ControlRecord, UNKNOWN_PERSON};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::warn;

/// What the actuator did for one batch
#[derive(Debug, Clone)]
pub enum ActuationReport {
    DoorOpened {
        audit: AuditRecord,
        control: ControlRecord,
        door_published: bool,
        status_published: bool,
    },
    UnknownRecorded {
        audit: AuditRecord,
        status_published: bool,
    },
}

impl ActuationReport {
    pub fn audit(&self) -> &AuditRecord {
        match self {
            ActuationReport::DoorOpened { audit, .. } => audit,
            ActuationReport::UnknownRecorded { audit, .. } => audit,
        }
    }
}

/// Turns a match result into broker commands and audit rows
///
/// Broker publishes are best effort and never block persistence.
pub struct Actuator {
    publisher: Arc<dyn FeedPublisher>,
    store: AccessStore,
    config: ActuationConfig,
    event_bus: Arc<EventBus>,
}

impl Actuator {
    pub fn new(
        publisher: Arc<dyn FeedPublisher>,
        store: AccessStore,
        config: ActuationConfig,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            publisher,
            store,
            config,
            event_bus,
        }
    }

    pub async fn actuate(&self, result: &MatchResult) -> Result<ActuationReport, StorageError> {
        match result {
            MatchResult::Matched { identity, .. } => {
                let door_published =
                    publish_logged(self.publisher.as_ref(), Feed::Door, COMMAND_ON).await;
                let status_published =
                    publish_logged(self.publisher.as_ref(), Feed::Status, &identity.name).await;
                if !door_published {
                    warn!("Door command for {} was not delivered", identity.name);
                }

                let name = identity.name.clone();
                let user_id = identity.user_id;
                let device_id = self.config.door_device_id;
                let equipment_id = self.config.door_equipment_id;
                let (audit, control) = self
                    .store
                    .run_blocking(move |store| {
                        store.record_door_open(&name, user_id, device_id, equipment_id)
                    })
                    .await?;

                let _ = self
                    .event_bus
                    .publish(SmartDoorEvent::DoorOpened {
                        name: identity.name.clone(),
                        user_id,
                        timestamp: SystemTime::now(),
                    })
                    .await;

                Ok(ActuationReport::DoorOpened {
                    audit,
                    control,
                    door_published,
                    status_published,
                })
            }
            MatchResult::Unmatched { frame } => {
                let status_published =
                    publish_logged(self.publisher.as_ref(), Feed::Status, UNKNOWN_PERSON).await;

                let image = frame.as_ref().map(|frame| frame.image.bytes.to_vec());
                let audit = self
                    .store
                    .run_blocking(move |store| store.record_unknown(image.as_deref()))
                    .await?;

                let _ = self
                    .event_bus
                    .publish(SmartDoorEvent::UnknownPerson {
                        timestamp: SystemTime::now(),
                    })
                    .await;

                Ok(ActuationReport::UnknownRecorded {
                    audit,
                    status_published,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::RecordingPublisher;
    use crate::config::SmartDoorConfig;
    use crate::storage::{AuditKind, NewUser};
    use crate::testing::{frame, identity};
    use tempfile::TempDir;

    fn setup() -> (TempDir, AccessStore, Arc<RecordingPublisher>, Actuator) {
        let dir = TempDir::new().unwrap();
        let store = AccessStore::open(dir.path().join("data.db"), chrono_tz::Asia::Ho_Chi_Minh)
            .unwrap();
        let publisher = Arc::new(RecordingPublisher::new());
        let actuator = Actuator::new(
            publisher.clone(),
            store.clone(),
            SmartDoorConfig::default().actuation,
            Arc::new(EventBus::new(16)),
        );
        (dir, store, publisher, actuator)
    }

    fn add_user(store: &AccessStore, username: &str) -> i64 {
        store
            .create_user(&NewUser {
                username: username.to_string(),
                ..NewUser::default()
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_match_opens_door_and_logs() {
        let (_dir, store, publisher, actuator) = setup();
        let user_id = add_user(&store, "alice");

        let result = MatchResult::Matched {
            identity: identity("Alice", user_id),
            frame: frame(2),
        };
        let report = actuator.actuate(&result).await.unwrap();

        assert_eq!(
            publisher.published(),
            vec![
                (Feed::Door, "ON".to_string()),
                (Feed::Status, "Alice".to_string())
            ]
        );
        match report {
            ActuationReport::DoorOpened { audit, control, .. } => {
                assert_eq!(audit.name.as_deref(), Some("Alice"));
                assert_eq!(control.user_id, user_id);
                assert_eq!(control.device_id, 1);
                assert_eq!(control.status.as_deref(), Some("sent"));
            }
            other => panic!("Unexpected report: {:?}", other),
        }
        assert_eq!(store.list_controls(user_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_door_publish_failure_still_persists() {
        let (_dir, store, publisher, actuator) = setup();
        let user_id = add_user(&store, "alice");
        publisher.fail_feed(Feed::Door);

        let result = MatchResult::Matched {
            identity: identity("Alice", user_id),
            frame: frame(1),
        };
        let report = actuator.actuate(&result).await.unwrap();

        assert!(matches!(
            report,
            ActuationReport::DoorOpened {
                door_published: false,
                status_published: true,
                ..
            }
        ));
        assert_eq!(publisher.payloads_for(Feed::Status), vec!["Alice"]);
        assert_eq!(store.latest_audit(5).unwrap().len(), 1);
        assert_eq!(store.list_controls(user_id).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_records_last_frame() {
        let (_dir, store, publisher, actuator) = setup();
        let last = frame(5);
        let expected = last.image.bytes.to_vec();

        let report = actuator
            .actuate(&MatchResult::Unmatched { frame: Some(last) })
            .await
            .unwrap();

        assert_eq!(publisher.payloads_for(Feed::Status), vec![UNKNOWN_PERSON]);
        assert_eq!(report.audit().kind, AuditKind::Unknown);
        let latest = store.latest_audit(1).unwrap();
        assert_eq!(latest[0].image.as_deref(), Some(expected.as_slice()));
    }

    #[tokio::test]
    async fn test_unmatched_without_frame() {
        let (_dir, store, _publisher, actuator) = setup();

        actuator
            .actuate(&MatchResult::Unmatched { frame: None })
            .await
            .unwrap();

        let latest = store.latest_audit(1).unwrap();
        assert_eq!(latest[0].name.as_deref(), Some(UNKNOWN_PERSON));
        assert!(latest[0].image.is_none());
    }
}

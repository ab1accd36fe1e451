use crate::actuation::{ActuationReport, Actuator};
use crate::error::Result;
use crate::events::{EventBus, SmartDoorEvent};
use crate::matcher::{CapturedFrame, EnrolledIdentity, FaceMatcher};
use crate::storage::AccessStore;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub batch_id: String,
    pub frames: usize,
    pub identities: usize,
    pub matched: Option<String>,
    pub actuation: ActuationReport,
}

/// One recognition pass over a completed batch
///
/// Identities are reloaded for every batch so enrollments take effect without
/// a restart.
pub struct BatchPass {
    store: AccessStore,
    matcher: FaceMatcher,
    actuator: Actuator,
    event_bus: Arc<EventBus>,
}

impl BatchPass {
    pub fn new(
        store: AccessStore,
        matcher: FaceMatcher,
        actuator: Actuator,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            matcher,
            actuator,
            event_bus,
        }
    }

    pub async fn run(&self, frames: Vec<CapturedFrame>) -> Result<BatchReport> {
        let batch_id = Uuid::new_v4().to_string();

        let stored = self.store.run_blocking(|store| store.load_identities()).await?;
        let identities: Vec<EnrolledIdentity> = stored
            .into_iter()
            .filter_map(|stored| match EnrolledIdentity::decode(stored) {
                Ok(identity) => Some(identity),
                Err(e) => {
                    warn!("Skipping enrolled identity: {}", e);
                    None
                }
            })
            .collect();

        info!(
            "Batch {}: {} frames against {} identities",
            batch_id,
            frames.len(),
            identities.len()
        );

        let result = self.matcher.match_batch(&frames, &identities).await;
        let matched = result.matched_name().map(str::to_string);
        let actuation = self.actuator.actuate(&result).await?;

        let _ = self
            .event_bus
            .publish(SmartDoorEvent::BatchCompleted {
                batch_id: batch_id.clone(),
                matched: matched.clone(),
            })
            .await;

        Ok(BatchReport {
            batch_id,
            frames: frames.len(),
            identities: identities.len(),
            matched,
            actuation,
        })
    }
}

use super::types::ComponentStates;
use super::{ComponentState, SmartDoorOrchestrator};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

impl SmartDoorOrchestrator {
    /// Update component state
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let mut states = self.component_states.lock().await;
        states.insert(component.to_string(), state);
        debug!("Component '{}' state changed to: {:?}", component, state);
    }

    /// Get component state
    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        let states = self.component_states.lock().await;
        states.get(component).copied()
    }

    /// Get all component states
    pub async fn get_all_component_states(&self) -> HashMap<String, ComponentState> {
        let states = self.component_states.lock().await;
        states.clone()
    }

    /// Shared handle to the state table
    pub fn component_states(&self) -> ComponentStates {
        Arc::clone(&self.component_states)
    }
}

mod orchestrator;
mod runtime;
mod shutdown;
mod startup;
mod state;
mod types;


pub use orchestrator::SmartDoorOrchestrator;
pub use types::{ComponentState, ComponentStates, ShutdownReason};

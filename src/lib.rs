pub mod actuation;
pub mod app;
pub mod broker;
pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod ingest;
pub mod matcher;
pub mod stats;
pub mod storage;

#[cfg(feature = "http")]
pub mod http;

#[cfg(test)]
mod testing;

pub use actuation::{ActuationReport, Actuator};
pub use app::{ComponentState, ShutdownReason, SmartDoorOrchestrator};
pub use broker::{BrokerBridge, Feed, FeedPublisher, FeedRouter, FeedSet, RecordingPublisher};
pub use config::SmartDoorConfig;
pub use control::{ControlRequest, ControlService};
pub use error::{Result, SmartDoorError};
pub use events::{EventBus, EventFilter, EventReceiver, SmartDoorEvent};
pub use ingest::{BatchPass, BatchReport, FrameIngest, IngestHandle};
pub use matcher::{
    CapturedFrame, DeepFaceVerifier, EnrolledIdentity, FaceImage, FaceMatcher, FaceVerifier,
    MatchResult, Verification,
};
pub use stats::{RuntimeStats, StatsSnapshot};
pub use storage::{AccessStore, AuditKind, AuditRecord, ControlRecord, NewUser, Role};

#[cfg(feature = "http")]
pub use http::{HttpServer, HttpServerBuilder};

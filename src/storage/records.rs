use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Display name recorded and published when no identity matches
pub const UNKNOWN_PERSON: &str = "Unknown Person";

/// Account role; the per-role attribute travels with the variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Role {
    Normal { action: Option<String> },
    Admin { access: Option<String> },
}

impl Role {
    pub fn kind(&self) -> &'static str {
        match self {
            Role::Normal { .. } => "normal",
            Role::Admin { .. } => "admin",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin { .. })
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Normal {
            action: Some("default_action".to_string()),
        }
    }
}

/// Fields for a new account
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub name: Option<String>,
    pub account: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub name: Option<String>,
    pub account: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
}

/// Raw enrolled identity row as read by the batch pass
#[derive(Debug, Clone)]
pub struct StoredIdentity {
    pub name: String,
    pub face_image: Vec<u8>,
    pub user_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditKind {
    #[serde(rename = "door-open")]
    DoorOpen,
    #[serde(rename = "unknown")]
    Unknown,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::DoorOpen => "door-open",
            AuditKind::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "door-open" => Some(AuditKind::DoorOpen),
            "unknown" => Some(AuditKind::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only door event
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: i64,
    pub kind: AuditKind,
    pub name: Option<String>,
    pub timestamp: DateTime<FixedOffset>,
    pub image: Option<Vec<u8>>,
}

/// Fields for a new control action
#[derive(Debug, Clone)]
pub struct NewControl {
    pub action: String,
    pub device_type: String,
    pub device_id: i64,
    pub status: Option<String>,
    pub user_id: i64,
    pub equipment_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ControlRecord {
    pub id: i64,
    pub action: String,
    pub device_type: String,
    pub device_id: i64,
    pub status: Option<String>,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: Option<DateTime<FixedOffset>>,
    pub user_id: i64,
    pub equipment_id: Option<i64>,
}

use super::records::{
    AuditKind, AuditRecord, ControlRecord, NewControl, NewUser, Role, StoredIdentity,
    UserRecord, UNKNOWN_PERSON,
};
use crate::error::StorageError;
use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// SQLite-backed store for accounts, enrolled faces, door events and controls.
///
/// The store holds no connection. Every operation opens its own connection
/// and, where it writes more than one row, its own transaction, so the
/// broker path and the HTTP path never share a session.
#[derive(Debug, Clone)]
pub struct AccessStore {
    path: PathBuf,
    timezone: Tz,
}

impl AccessStore {
    /// Opens or creates the database and applies the schema.
    pub fn open(path: impl AsRef<Path>, timezone: Tz) -> Result<Self, StorageError> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            timezone,
        };

        let conn = store.connect()?;
        conn.execute_batch(SCHEMA_SQL)?;

        info!("Access store ready at {}", store.path.display());
        Ok(store)
    }

    /// Current time in the store's timezone
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.timezone).fixed_offset()
    }

    fn connect(&self) -> Result<Connection, StorageError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }

    /// Runs a store operation on the blocking pool.
    pub async fn run_blocking<T, F>(&self, operation: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&AccessStore) -> Result<T, StorageError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || operation(&store))
            .await
            .map_err(|e| StorageError::Task {
                details: e.to_string(),
            })?
    }

    /// Creates an account; usernames are unique.
    pub fn create_user(&self, user: &NewUser) -> Result<i64, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![user.username],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StorageError::UserExists {
                username: user.username.clone(),
            });
        }

        let role = serde_json::to_string(&user.role)?;
        tx.execute(
            "INSERT INTO users (username, name, account, phone, role) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user.username, user.name, user.account, user.phone, role],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(
            "Registered {} user '{}' with id {}",
            user.role.kind(),
            user.username,
            id
        );
        Ok(id)
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<UserRecord>, StorageError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, username, name, account, phone, role FROM users WHERE id = ?1",
                params![user_id],
                user_columns,
            )
            .optional()?;
        row.map(decode_user).transpose()
    }

    pub fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, StorageError> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, username, name, account, phone, role FROM users WHERE username = ?1",
                params![username],
                user_columns,
            )
            .optional()?;
        row.map(decode_user).transpose()
    }

    /// Creates or replaces the user's face identity. Returns its row id.
    pub fn enroll_identity(
        &self,
        user_id: i64,
        face_id: &str,
        name: Option<&str>,
        face_image: &[u8],
    ) -> Result<i64, StorageError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let user: Option<i64> = tx
            .query_row(
                "SELECT id FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        if user.is_none() {
            return Err(StorageError::UserNotFound { user_id });
        }

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM face_identity WHERE user_id = ?1 ORDER BY id LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE face_identity SET face_id = ?1, name = ?2, face_image = ?3 WHERE id = ?4",
                    params![face_id, name, face_image, id],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO face_identity (face_id, name, face_image, user_id) VALUES (?1, ?2, ?3, ?4)",
                    params![face_id, name, face_image, user_id],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.commit()?;

        info!(
            "Face identity {} saved for user {} ({} bytes)",
            id,
            user_id,
            face_image.len()
        );
        Ok(id)
    }

    /// All enrolled identities with a reference image, in insertion order.
    pub fn load_identities(&self) -> Result<Vec<StoredIdentity>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT COALESCE(f.name, u.name, u.username), f.face_image, f.user_id
             FROM face_identity f
             JOIN users u ON u.id = f.user_id
             WHERE f.face_image IS NOT NULL
             ORDER BY f.id",
        )?;

        let identities = stmt
            .query_map([], |row| {
                Ok(StoredIdentity {
                    name: row.get(0)?,
                    face_image: row.get(1)?,
                    user_id: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Loaded {} enrolled identities", identities.len());
        Ok(identities)
    }

    /// Records an automatic door opening: the control action and the audit
    /// entry commit together or not at all.
    pub fn record_door_open(
        &self,
        name: &str,
        user_id: i64,
        device_id: i64,
        equipment_id: i64,
    ) -> Result<(AuditRecord, ControlRecord), StorageError> {
        let now = self.now();
        let mut conn = self.connect()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO control (action, device_type, device_id, status, start_time, user_id, equipment_id)
             VALUES ('open door', 'door', ?1, 'sent', ?2, ?3, ?4)",
            params![device_id, now.to_rfc3339(), user_id, equipment_id],
        )?;
        let control_id = tx.last_insert_rowid();

        tx.execute(
            "INSERT INTO open_door_logs (kind, name, timestamp) VALUES (?1, ?2, ?3)",
            params![AuditKind::DoorOpen.as_str(), name, now.to_rfc3339()],
        )?;
        let audit_id = tx.last_insert_rowid();
        tx.commit()?;

        let audit = AuditRecord {
            id: audit_id,
            kind: AuditKind::DoorOpen,
            name: Some(name.to_string()),
            timestamp: now,
            image: None,
        };
        let control = ControlRecord {
            id: control_id,
            action: "open door".to_string(),
            device_type: "door".to_string(),
            device_id,
            status: Some("sent".to_string()),
            start_time: now,
            end_time: None,
            user_id,
            equipment_id: Some(equipment_id),
        };
        Ok((audit, control))
    }

    /// Records an unknown person, with the captured frame when there is one.
    pub fn record_unknown(&self, image: Option<&[u8]>) -> Result<AuditRecord, StorageError> {
        let now = self.now();
        let conn = self.connect()?;

        conn.execute(
            "INSERT INTO open_door_logs (kind, name, timestamp, unknown_person) VALUES (?1, ?2, ?3, ?4)",
            params![
                AuditKind::Unknown.as_str(),
                UNKNOWN_PERSON,
                now.to_rfc3339(),
                image
            ],
        )?;

        Ok(AuditRecord {
            id: conn.last_insert_rowid(),
            kind: AuditKind::Unknown,
            name: Some(UNKNOWN_PERSON.to_string()),
            timestamp: now,
            image: image.map(<[u8]>::to_vec),
        })
    }

    /// Most recent audit entries, newest first.
    pub fn latest_audit(&self, limit: usize) -> Result<Vec<AuditRecord>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, kind, name, timestamp, unknown_person
             FROM open_door_logs
             ORDER BY id DESC
             LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<Vec<u8>>>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, kind, name, timestamp, image)| {
                let kind = AuditKind::parse(&kind).ok_or_else(|| StorageError::InvalidValue {
                    table: "open_door_logs",
                    column: "kind",
                    value: kind.clone(),
                })?;
                Ok(AuditRecord {
                    id,
                    kind,
                    name,
                    timestamp: parse_timestamp("open_door_logs", &timestamp)?,
                    image,
                })
            })
            .collect()
    }

    /// Inserts a control action stamped with the current time.
    pub fn insert_control(&self, control: &NewControl) -> Result<ControlRecord, StorageError> {
        let now = self.now();
        let conn = self.connect()?;

        conn.execute(
            "INSERT INTO control (action, device_type, device_id, status, start_time, user_id, equipment_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                control.action,
                control.device_type,
                control.device_id,
                control.status,
                now.to_rfc3339(),
                control.user_id,
                control.equipment_id
            ],
        )?;

        Ok(ControlRecord {
            id: conn.last_insert_rowid(),
            action: control.action.clone(),
            device_type: control.device_type.clone(),
            device_id: control.device_id,
            status: control.status.clone(),
            start_time: now,
            end_time: None,
            user_id: control.user_id,
            equipment_id: control.equipment_id,
        })
    }

    pub fn list_controls(&self, user_id: i64) -> Result<Vec<ControlRecord>, StorageError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, action, device_type, device_id, status, start_time, end_time, user_id, equipment_id
             FROM control
             WHERE user_id = ?1
             ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, Option<i64>>(8)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(id, action, device_type, device_id, status, start, end, user_id, equipment_id)| {
                    Ok(ControlRecord {
                        id,
                        action,
                        device_type,
                        device_id,
                        status,
                        start_time: parse_timestamp("control", &start)?,
                        end_time: end
                            .map(|end| parse_timestamp("control", &end))
                            .transpose()?,
                        user_id,
                        equipment_id,
                    })
                },
            )
            .collect()
    }
}

type UserColumns = (
    i64,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    String,
);

fn user_columns(row: &Row<'_>) -> rusqlite::Result<UserColumns> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn decode_user(columns: UserColumns) -> Result<UserRecord, StorageError> {
    let (id, username, name, account, phone, role) = columns;
    let role: Role = serde_json::from_str(&role)?;
    Ok(UserRecord {
        id,
        username,
        name,
        account,
        phone,
        role,
    })
}

fn parse_timestamp(
    table: &'static str,
    value: &str,
) -> Result<DateTime<FixedOffset>, StorageError> {
    DateTime::parse_from_rfc3339(value).map_err(|_| StorageError::InvalidValue {
        table,
        column: "timestamp",
        value: value.to_string(),
    })
}

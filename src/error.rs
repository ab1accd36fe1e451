use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmartDoorError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Control error: {0}")]
    Control(#[from] ControlError),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl SmartDoorError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by the MQTT bridge
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Failed to publish to feed '{feed}': {details}")]
    PublishFailed { feed: String, details: String },

    #[error("Failed to subscribe to feed '{feed}': {details}")]
    SubscribeFailed { feed: String, details: String },

    #[error("Broker event loop already started")]
    AlreadyConnected,

    #[error("Broker connection error: {details}")]
    Connection { details: String },
}

/// Errors raised while turning an image feed payload into a frame
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Undecodable image in slot {slot}: {source}")]
    Image {
        slot: usize,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to write frame file {path}: {source}")]
    FrameWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Ingest queue closed")]
    QueueClosed,
}

/// Errors raised by a face verification backend
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("Verifier request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Verifier rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Undecodable reference image for '{name}': {source}")]
    Reference {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Verification failed: {details}")]
    Failed { details: String },
}

/// Errors raised by the SQLite access store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Invalid role encoding: {0}")]
    Role(#[from] serde_json::Error),

    #[error("Invalid {column} '{value}' in {table}")]
    InvalidValue {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    #[error("User '{username}' already exists")]
    UserExists { username: String },

    #[error("User {user_id} not found")]
    UserNotFound { user_id: i64 },

    #[error("Storage task failed: {details}")]
    Task { details: String },
}

/// Errors raised by manual control commands
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("action, device_type, and device_id are required")]
    MissingField,

    #[error("Unsupported device type '{device_type}'")]
    UnsupportedDevice { device_type: String },

    #[error("Failed to send command: {0}")]
    SendFailed(#[source] BrokerError),
}

/// Errors raised by the HTTP surface
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Failed to bind {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP server error: {details}")]
    ServerFailed { details: String },
}

pub type Result<T> = std::result::Result<T, SmartDoorError>;

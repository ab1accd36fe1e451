use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SmartDoorConfig {
    pub broker: BrokerConfig,
    pub feeds: FeedConfig,
    pub ingest: IngestConfig,
    pub matcher: MatcherConfig,
    pub actuation: ActuationConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BrokerConfig {
    /// Broker host name
    #[serde(default = "default_broker_host")]
    pub host: String,

    /// Broker port
    #[serde(default = "default_broker_port")]
    pub port: u16,

    /// Account name; also the topic prefix (`{username}/feeds/{key}`)
    #[serde(default)]
    pub username: String,

    /// Account key used as the MQTT password
    #[serde(default)]
    pub key: String,

    /// MQTT client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Keep-alive interval in seconds
    #[serde(default = "default_keep_alive_seconds")]
    pub keep_alive_seconds: u64,

    /// Delay before the event loop is polled again after a connection error
    #[serde(default = "default_reconnect_delay_seconds")]
    pub reconnect_delay_seconds: u64,

    /// Capacity of the client request channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Connect over TLS
    #[serde(default)]
    pub use_tls: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FeedConfig {
    /// Display/status feed (identity name or "Unknown Person")
    #[serde(default = "default_status_feed")]
    pub status: String,

    /// Door actuation feed
    #[serde(default = "default_door_feed")]
    pub door: String,

    /// Light actuation feed
    #[serde(default = "default_light_feed")]
    pub light: String,

    /// LED feed
    #[serde(default = "default_led_feed")]
    pub led: String,

    /// Base64 JPEG image upload feed
    #[serde(default = "default_image_feed")]
    pub image: String,

    /// Button feed
    #[serde(default = "default_button_feed")]
    pub button: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IngestConfig {
    /// Number of frames per batch pass
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Directory receiving the numbered frame files
    #[serde(default = "default_frame_dir")]
    pub frame_dir: String,

    /// Bounded queue between the broker and the ingest actor
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MatcherConfig {
    /// Base URL of the DeepFace-compatible verification service
    #[serde(default = "default_matcher_endpoint")]
    pub endpoint: String,

    /// Recognition model name
    #[serde(default = "default_model_name")]
    pub model_name: String,

    /// Face detector backend
    #[serde(default = "default_detector_backend")]
    pub detector_backend: String,

    /// Distance metric
    #[serde(default = "default_distance_metric")]
    pub distance_metric: String,

    /// Fail verification when no face is detected
    #[serde(default = "default_enforce_detection")]
    pub enforce_detection: bool,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ActuationConfig {
    /// Device id recorded on automatic door-open controls
    #[serde(default = "default_door_device_id")]
    pub door_device_id: i64,

    /// Equipment id recorded on automatic door-open controls
    #[serde(default = "default_door_equipment_id")]
    pub door_equipment_id: i64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Serve the HTTP API
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,

    /// IP address to bind to
    #[serde(default = "default_http_ip")]
    pub ip: String,

    /// Port to listen on
    #[serde(default = "default_http_port")]
    pub port: u16,

    /// Number of rows returned by /open_door_logs/latest
    #[serde(default = "default_latest_logs_limit")]
    pub latest_logs_limit: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SystemConfig {
    /// IANA timezone used for audit and control timestamps
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl SmartDoorConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("smartdoor.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let mut builder = Config::builder()
            .set_default("broker.host", default_broker_host())?
            .set_default("broker.port", default_broker_port() as i64)?
            .set_default("broker.username", "")?
            .set_default("broker.key", "")?
            .set_default("broker.client_id", default_client_id())?
            .set_default("broker.keep_alive_seconds", default_keep_alive_seconds())?
            .set_default(
                "broker.reconnect_delay_seconds",
                default_reconnect_delay_seconds(),
            )?
            .set_default(
                "broker.channel_capacity",
                default_channel_capacity() as i64,
            )?
            .set_default("broker.use_tls", false)?
            .set_default("feeds.status", default_status_feed())?
            .set_default("feeds.door", default_door_feed())?
            .set_default("feeds.light", default_light_feed())?
            .set_default("feeds.led", default_led_feed())?
            .set_default("feeds.image", default_image_feed())?
            .set_default("feeds.button", default_button_feed())?
            .set_default("ingest.batch_size", default_batch_size() as i64)?
            .set_default("ingest.frame_dir", default_frame_dir())?
            .set_default("ingest.queue_capacity", default_queue_capacity() as i64)?
            .set_default("matcher.endpoint", default_matcher_endpoint())?
            .set_default("matcher.model_name", default_model_name())?
            .set_default("matcher.detector_backend", default_detector_backend())?
            .set_default("matcher.distance_metric", default_distance_metric())?
            .set_default("matcher.enforce_detection", default_enforce_detection())?
            .set_default(
                "matcher.request_timeout_seconds",
                default_request_timeout_seconds(),
            )?
            .set_default("actuation.door_device_id", default_door_device_id())?
            .set_default("actuation.door_equipment_id", default_door_equipment_id())?
            .set_default("storage.database_path", default_database_path())?
            .set_default("http.enabled", default_http_enabled())?
            .set_default("http.ip", default_http_ip())?
            .set_default("http.port", default_http_port() as i64)?
            .set_default(
                "http.latest_logs_limit",
                default_latest_logs_limit() as i64,
            )?
            .set_default("system.timezone", default_timezone())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?;

        // Adafruit IO style credentials act as defaults; file and SMARTDOOR_* win
        if let Ok(username) = std::env::var("AIO_USERNAME") {
            builder = builder.set_default("broker.username", username)?;
        }
        if let Ok(key) = std::env::var("AIO_KEY") {
            builder = builder.set_default("broker.key", key)?;
        }

        let settings = builder
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables, e.g. SMARTDOOR_BROKER__PORT
            .add_source(
                Environment::with_prefix("SMARTDOOR")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: SmartDoorConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config.redacted());

        Ok(config)
    }

    /// Copy of the configuration with the broker key masked, for logging
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.broker.key.is_empty() {
            copy.broker.key = "********".to_string();
        }
        copy
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.is_empty() {
            return Err(ConfigError::Message(
                "Broker host must not be empty".to_string(),
            ));
        }

        if self.broker.keep_alive_seconds < 5 {
            return Err(ConfigError::Message(
                "Broker keep_alive_seconds must be at least 5".to_string(),
            ));
        }

        if self.broker.channel_capacity == 0 {
            return Err(ConfigError::Message(
                "Broker channel_capacity must be greater than 0".to_string(),
            ));
        }

        let feeds = [
            ("status", &self.feeds.status),
            ("door", &self.feeds.door),
            ("light", &self.feeds.light),
            ("led", &self.feeds.led),
            ("image", &self.feeds.image),
            ("button", &self.feeds.button),
        ];
        let mut seen = HashSet::new();
        for (name, key) in feeds {
            if key.is_empty() {
                return Err(ConfigError::Message(format!(
                    "Feed '{}' must not be empty",
                    name
                )));
            }
            if !seen.insert(key.as_str()) {
                return Err(ConfigError::Message(format!(
                    "Feed key '{}' is used more than once",
                    key
                )));
            }
        }

        if self.ingest.batch_size == 0 {
            return Err(ConfigError::Message(
                "Ingest batch_size must be greater than 0".to_string(),
            ));
        }

        if self.ingest.queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Ingest queue_capacity must be greater than 0".to_string(),
            ));
        }

        if self.http.latest_logs_limit == 0 {
            return Err(ConfigError::Message(
                "HTTP latest_logs_limit must be greater than 0".to_string(),
            ));
        }

        if self.system.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Message(format!(
                "Unknown timezone '{}'",
                self.system.timezone
            )));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parsed timezone, falling back to UTC for an unknown name
    pub fn timezone(&self) -> chrono_tz::Tz {
        self.system.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl Default for SmartDoorConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig {
                host: default_broker_host(),
                port: default_broker_port(),
                username: String::new(),
                key: String::new(),
                client_id: default_client_id(),
                keep_alive_seconds: default_keep_alive_seconds(),
                reconnect_delay_seconds: default_reconnect_delay_seconds(),
                channel_capacity: default_channel_capacity(),
                use_tls: false,
            },
            feeds: FeedConfig {
                status: default_status_feed(),
                door: default_door_feed(),
                light: default_light_feed(),
                led: default_led_feed(),
                image: default_image_feed(),
                button: default_button_feed(),
            },
            ingest: IngestConfig {
                batch_size: default_batch_size(),
                frame_dir: default_frame_dir(),
                queue_capacity: default_queue_capacity(),
            },
            matcher: MatcherConfig {
                endpoint: default_matcher_endpoint(),
                model_name: default_model_name(),
                detector_backend: default_detector_backend(),
                distance_metric: default_distance_metric(),
                enforce_detection: default_enforce_detection(),
                request_timeout_seconds: default_request_timeout_seconds(),
            },
            actuation: ActuationConfig {
                door_device_id: default_door_device_id(),
                door_equipment_id: default_door_equipment_id(),
            },
            storage: StorageConfig {
                database_path: default_database_path(),
            },
            http: HttpConfig {
                enabled: default_http_enabled(),
                ip: default_http_ip(),
                port: default_http_port(),
                latest_logs_limit: default_latest_logs_limit(),
            },
            system: SystemConfig {
                timezone: default_timezone(),
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

// Default value functions
fn default_broker_host() -> String {
    "io.adafruit.com".to_string()
}
fn default_broker_port() -> u16 {
    1883
}
fn default_client_id() -> String {
    "smartdoor".to_string()
}
fn default_keep_alive_seconds() -> u64 {
    30
}
fn default_reconnect_delay_seconds() -> u64 {
    5
}
fn default_channel_capacity() -> usize {
    64
}

fn default_status_feed() -> String {
    "project-242.name".to_string()
}
fn default_door_feed() -> String {
    "project-242.door".to_string()
}
fn default_light_feed() -> String {
    "project-242.light".to_string()
}
fn default_led_feed() -> String {
    "project-242.led".to_string()
}
fn default_image_feed() -> String {
    "project-242.image".to_string()
}
fn default_button_feed() -> String {
    "project-242.button".to_string()
}

fn default_batch_size() -> usize {
    5
}
fn default_frame_dir() -> String {
    "./frames".to_string()
}
fn default_queue_capacity() -> usize {
    32
}

fn default_matcher_endpoint() -> String {
    "http://127.0.0.1:5005".to_string()
}
fn default_model_name() -> String {
    "Facenet512".to_string()
}
fn default_detector_backend() -> String {
    "opencv".to_string()
}
fn default_distance_metric() -> String {
    "cosine".to_string()
}
fn default_enforce_detection() -> bool {
    true
}
fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_door_device_id() -> i64 {
    1
}
fn default_door_equipment_id() -> i64 {
    1
}

fn default_database_path() -> String {
    "./data.db".to_string()
}

fn default_http_enabled() -> bool {
    true
}
fn default_http_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    5000
}
fn default_latest_logs_limit() -> usize {
    5
}

fn default_timezone() -> String {
    "Asia/Ho_Chi_Minh".to_string()
}
fn default_event_bus_capacity() -> usize {
    100
}

//! Configuration System
//!
//! Two layers:
//!
//! - [`Options`]: the runtime configuration handed to [`Hub::new`](crate::Hub::new),
//!   including the validator and filter hooks.
//! - [`Config`]: the file/environment configuration used by the `wsevent`
//!   binary. Loaded from TOML with `WSEVENT_*` environment overrides and
//!   converted to [`Options`] with [`Config::hub_options`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::hooks::{AcceptAll, EventFilter, RegistrationValidator};

/// Default capacity of the shared publish queue
pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 1024;
/// Default number of dispatcher workers
pub const DEFAULT_PUBLISH_ROUTINE_NUM: usize = 4;
/// Default time a connection may stay unregistered
pub const DEFAULT_REGISTER_TIMEOUT: Duration = Duration::from_secs(60);
/// Default capacity of each client's outbound queue
pub const DEFAULT_CLIENT_QUEUE_SIZE: usize = 512;

/// Socket-level parameters for each connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Maximum inbound message size in bytes
    pub max_message_size: usize,
    /// Deadline for writing a single frame
    pub write_wait: Duration,
    /// Peer liveness timeout, reset by any inbound frame
    pub pong_wait: Duration,
    /// Interval between pings, must be shorter than `pong_wait`
    pub ping_period: Duration,
}

impl Default for TransportOptions {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            max_message_size: 4 * 1024,
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
        }
    }
}

/// Runtime configuration of a hub
pub struct Options<E> {
    /// Capacity of the shared publish queue
    pub event_queue_size: usize,
    /// Number of dispatcher workers
    pub publish_routine_num: usize,
    /// Time a connection may remain unregistered before it is closed
    pub register_timeout: Duration,
    /// Log every broadcast event
    pub log_event_enabled: bool,
    /// Capacity of each client's outbound queue
    pub client_queue_size: usize,
    /// Socket parameters
    pub transport: TransportOptions,
    /// Registration validator
    pub validator: Arc<dyn RegistrationValidator>,
    /// Delivery filter
    pub filter: Arc<dyn EventFilter<E>>,
}

impl<E> Default for Options<E> {
    fn default() -> Self {
        Self {
            event_queue_size: DEFAULT_EVENT_QUEUE_SIZE,
            publish_routine_num: DEFAULT_PUBLISH_ROUTINE_NUM,
            register_timeout: DEFAULT_REGISTER_TIMEOUT,
            log_event_enabled: false,
            client_queue_size: DEFAULT_CLIENT_QUEUE_SIZE,
            transport: TransportOptions::default(),
            validator: Arc::new(AcceptAll),
            filter: Arc::new(AcceptAll),
        }
    }
}

impl<E> Clone for Options<E> {
    fn clone(&self) -> Self {
        Self {
            event_queue_size: self.event_queue_size,
            publish_routine_num: self.publish_routine_num,
            register_timeout: self.register_timeout,
            log_event_enabled: self.log_event_enabled,
            client_queue_size: self.client_queue_size,
            transport: self.transport.clone(),
            validator: Arc::clone(&self.validator),
            filter: Arc::clone(&self.filter),
        }
    }
}

impl<E> std::fmt::Debug for Options<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Options")
            .field("event_queue_size", &self.event_queue_size)
            .field("publish_routine_num", &self.publish_routine_num)
            .field("register_timeout", &self.register_timeout)
            .field("log_event_enabled", &self.log_event_enabled)
            .field("client_queue_size", &self.client_queue_size)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl<E> Options<E> {
    /// Replace the registration validator
    pub fn with_validator<V>(mut self, validator: V) -> Self
    where
        V: RegistrationValidator + 'static,
    {
        self.validator = Arc::new(validator);
        self
    }

    /// Replace the delivery filter
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: EventFilter<E> + 'static,
    {
        self.filter = Arc::new(filter);
        self
    }

    /// Replace unset (zero) values with their defaults
    pub fn normalized(mut self) -> Self {
        let defaults = TransportOptions::default();

        if self.event_queue_size == 0 {
            self.event_queue_size = DEFAULT_EVENT_QUEUE_SIZE;
        }
        if self.publish_routine_num == 0 {
            self.publish_routine_num = DEFAULT_PUBLISH_ROUTINE_NUM;
        }
        if self.register_timeout.is_zero() {
            self.register_timeout = DEFAULT_REGISTER_TIMEOUT;
        }
        if self.client_queue_size == 0 {
            self.client_queue_size = DEFAULT_CLIENT_QUEUE_SIZE;
        }

        let transport = &mut self.transport;
        if transport.max_message_size == 0 {
            transport.max_message_size = defaults.max_message_size;
        }
        if transport.write_wait.is_zero() {
            transport.write_wait = defaults.write_wait;
        }
        if transport.pong_wait.is_zero() {
            transport.pong_wait = defaults.pong_wait;
        }
        if transport.ping_period.is_zero() || transport.ping_period >= transport.pong_wait {
            transport.ping_period = transport.pong_wait * 9 / 10;
        }

        self
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub hub: HubConfig,

    #[serde(default)]
    pub transport: TransportConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hub configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_event_queue_size")]
    pub event_queue_size: usize,

    #[serde(default = "default_publish_routine_num")]
    pub publish_routine_num: usize,

    #[serde(default = "default_register_timeout_secs")]
    pub register_timeout_secs: u64,

    #[serde(default)]
    pub log_event_enabled: bool,

    #[serde(default = "default_client_queue_size")]
    pub client_queue_size: usize,
}

fn default_event_queue_size() -> usize {
    DEFAULT_EVENT_QUEUE_SIZE
}

fn default_publish_routine_num() -> usize {
    DEFAULT_PUBLISH_ROUTINE_NUM
}

fn default_register_timeout_secs() -> u64 {
    DEFAULT_REGISTER_TIMEOUT.as_secs()
}

fn default_client_queue_size() -> usize {
    DEFAULT_CLIENT_QUEUE_SIZE
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            event_queue_size: default_event_queue_size(),
            publish_routine_num: default_publish_routine_num(),
            register_timeout_secs: default_register_timeout_secs(),
            log_event_enabled: false,
            client_queue_size: default_client_queue_size(),
        }
    }
}

/// Per-connection transport configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,

    #[serde(default = "default_write_wait_secs")]
    pub write_wait_secs: u64,

    #[serde(default = "default_pong_wait_secs")]
    pub pong_wait_secs: u64,
}

fn default_max_message_size() -> usize {
    4 * 1024
}

fn default_write_wait_secs() -> u64 {
    10
}

fn default_pong_wait_secs() -> u64 {
    60
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: default_max_message_size(),
            write_wait_secs: default_write_wait_secs(),
            pong_wait_secs: default_pong_wait_secs(),
        }
    }
}

/// Listener configuration for the standalone server
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_path")]
    pub path: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_path() -> String {
    "/wsevents".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            path: default_path(),
        }
    }
}

impl ServerConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("wsevent").join("config.toml")),
            Some(PathBuf::from("/etc/wsevent/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Build hub options from this configuration, with default hooks
    pub fn hub_options<E>(&self) -> Options<E> {
        let pong_wait = Duration::from_secs(self.transport.pong_wait_secs);

        Options {
            event_queue_size: self.hub.event_queue_size,
            publish_routine_num: self.hub.publish_routine_num,
            register_timeout: Duration::from_secs(self.hub.register_timeout_secs),
            log_event_enabled: self.hub.log_event_enabled,
            client_queue_size: self.hub.client_queue_size,
            transport: TransportOptions {
                max_message_size: self.transport.max_message_size,
                write_wait: Duration::from_secs(self.transport.write_wait_secs),
                pong_wait,
                ping_period: pong_wait * 9 / 10,
            },
            ..Options::default()
        }
        .normalized()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Server overrides
        if let Some(host) = lookup("WSEVENT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("WSEVENT_PORT").and_then(|s| s.parse().ok()) {
            self.server.port = port;
        }
        if let Some(path) = lookup("WSEVENT_PATH") {
            self.server.path = path;
        }

        // Hub overrides
        if let Some(size) = lookup("WSEVENT_EVENT_QUEUE_SIZE").and_then(|s| s.parse().ok()) {
            self.hub.event_queue_size = size;
        }
        if let Some(num) = lookup("WSEVENT_PUBLISH_ROUTINE_NUM").and_then(|s| s.parse().ok()) {
            self.hub.publish_routine_num = num;
        }
        if let Some(secs) = lookup("WSEVENT_REGISTER_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
            self.hub.register_timeout_secs = secs;
        }
        if let Some(enabled) = lookup("WSEVENT_LOG_EVENT") {
            self.hub.log_event_enabled = enabled.to_lowercase() == "true" || enabled == "1";
        }

        // Logging overrides
        if let Some(level) = lookup("WSEVENT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("WSEVENT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# wsevent Configuration
#
# Environment variables override these settings:
# - WSEVENT_HOST
# - WSEVENT_PORT
# - WSEVENT_PATH
# - WSEVENT_EVENT_QUEUE_SIZE
# - WSEVENT_PUBLISH_ROUTINE_NUM
# - WSEVENT_REGISTER_TIMEOUT_SECS
# - WSEVENT_LOG_EVENT
# - WSEVENT_LOG_LEVEL
# - WSEVENT_LOG_FORMAT

[hub]
# Capacity of the shared publish queue
event_queue_size = 1024

# Number of broadcast workers
publish_routine_num = 4

# Seconds a connection may stay unregistered before it is closed
register_timeout_secs = 60

# Log every broadcast event
log_event_enabled = false

# Capacity of each client's outbound queue
client_queue_size = 512

[transport]
# Maximum inbound message size (bytes)
max_message_size = 4096

# Deadline for a single write (seconds)
write_wait_secs = 10

# Peer liveness timeout (seconds), pings are sent at 90% of it
pong_wait_secs = 60

[server]
# Listener host
host = "0.0.0.0"

# Listener port
port = 8080

# WebSocket path
path = "/wsevents"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_options() {
        let options = Options::<Value>::default();
        assert_eq!(options.event_queue_size, 1024);
        assert_eq!(options.publish_routine_num, 4);
        assert_eq!(options.register_timeout, Duration::from_secs(60));
        assert!(!options.log_event_enabled);
        assert_eq!(options.transport.max_message_size, 4096);
        assert_eq!(options.transport.ping_period, Duration::from_secs(54));
        assert!(options.filter.accept(&Value::Null, &Value::Null));
    }

    #[test]
    fn test_normalized_fills_zero_values() {
        let options = Options::<Value> {
            event_queue_size: 0,
            publish_routine_num: 0,
            register_timeout: Duration::ZERO,
            client_queue_size: 0,
            transport: TransportOptions {
                max_message_size: 0,
                write_wait: Duration::ZERO,
                pong_wait: Duration::from_secs(10),
                ping_period: Duration::from_secs(20),
            },
            ..Options::default()
        }
        .normalized();

        assert_eq!(options.event_queue_size, DEFAULT_EVENT_QUEUE_SIZE);
        assert_eq!(options.publish_routine_num, DEFAULT_PUBLISH_ROUTINE_NUM);
        assert_eq!(options.register_timeout, DEFAULT_REGISTER_TIMEOUT);
        assert_eq!(options.client_queue_size, DEFAULT_CLIENT_QUEUE_SIZE);
        assert_eq!(options.transport.max_message_size, 4096);
        assert_eq!(options.transport.write_wait, Duration::from_secs(10));
        assert_eq!(options.transport.ping_period, Duration::from_secs(9));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[hub]\npublish_routine_num = 1\nregister_timeout_secs = 5\n\n[server]\nport = 9000"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.hub.publish_routine_num, 1);
        assert_eq!(config.hub.register_timeout_secs, 5);
        assert_eq!(config.hub.event_queue_size, 1024);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.path, "/wsevents");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[hub\nbroken").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));

        let err = Config::load(Path::new("/nonexistent/wsevent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.hub.event_queue_size, 1024);
        assert_eq!(config.transport.pong_wait_secs, 60);
        assert_eq!(config.server.addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("WSEVENT_PORT", "9100"),
            ("WSEVENT_PUBLISH_ROUTINE_NUM", "2"),
            ("WSEVENT_LOG_EVENT", "true"),
            ("WSEVENT_EVENT_QUEUE_SIZE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.hub.publish_routine_num, 2);
        assert!(config.hub.log_event_enabled);
        assert_eq!(config.hub.event_queue_size, 1024);
    }

    #[test]
    fn test_hub_options_conversion() {
        let mut config = Config::default();
        config.hub.register_timeout_secs = 3;
        config.transport.pong_wait_secs = 20;

        let options: Options<Value> = config.hub_options();
        assert_eq!(options.register_timeout, Duration::from_secs(3));
        assert_eq!(options.transport.pong_wait, Duration::from_secs(20));
        assert_eq!(options.transport.ping_period, Duration::from_secs(18));
    }
}

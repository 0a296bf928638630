//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::publisher::PublisherConfig;
use crate::weather::{WeatherClientConfig, DEFAULT_ENDPOINT};
use crate::websocket::{RegistryConfig, SessionConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub weather: WeatherConfig,

    #[serde(default)]
    pub publisher: PollingConfig,

    #[serde(default)]
    pub subscribers: SubscribersConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Dashboard assets served for any path without a route
    #[serde(default = "default_static_dir")]
    pub static_dir: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_static_dir() -> Option<String> {
    Some("./templates".to_string())
}

impl ServerConfig {
    /// Socket address string to bind
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// Upstream weather API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Usually supplied through `API_KEY` rather than the file
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_units")]
    pub units: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_units() -> String {
    "metric".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            units: default_units(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl WeatherConfig {
    /// True when a non-blank credential is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Publish loop configuration (`[publisher]`)
#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Location published at startup
    #[serde(default = "default_location")]
    pub location: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_secs: u64,
}

fn default_location() -> String {
    "Phnom Penh".to_string()
}

fn default_poll_interval() -> u64 {
    3
}

fn default_retry_backoff() -> u64 {
    5
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            location: default_location(),
            poll_interval_secs: default_poll_interval(),
            retry_backoff_secs: default_retry_backoff(),
        }
    }
}

/// Subscriber limits (`[subscribers]`)
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribersConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,

    #[serde(default = "default_max_subscribers")]
    pub max_subscribers: usize,
}

fn default_queue_capacity() -> usize {
    10
}

fn default_write_timeout() -> u64 {
    5
}

fn default_max_subscribers() -> usize {
    1000
}

impl Default for SubscribersConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            write_timeout_secs: default_write_timeout(),
            max_subscribers: default_max_subscribers(),
        }
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

        Self::parse(&content).map_err(|error| ConfigError::Parse {
            path: path.to_path_buf(),
            error,
        })
    }

    fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Load configuration with environment variable overrides
    ///
    /// An explicit path must exist. Without one the default locations are
    /// searched and built-in defaults used if none is found.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => match Self::find_default_path() {
                Some(path) => {
                    tracing::info!("Loaded config from {:?}", path);
                    Self::load(&path)?
                }
                None => {
                    tracing::info!("Using default config with environment overrides");
                    Config::default()
                }
            },
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// First existing file among the default config locations
    pub fn find_default_path() -> Option<PathBuf> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("skycast").join("config.toml")),
            Some(PathBuf::from("/etc/skycast/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        config_paths.into_iter().flatten().find(|p| p.exists())
    }

    /// Apply process environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(host) = lookup("SKYCAST_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SKYCAST_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid SKYCAST_PORT"),
            }
        }
        if let Some(dir) = lookup("SKYCAST_STATIC_DIR") {
            self.server.static_dir = Some(dir);
        }

        // Weather overrides
        if let Some(endpoint) = lookup("SKYCAST_WEATHER_ENDPOINT") {
            self.weather.endpoint = endpoint;
        }
        if let Some(key) = lookup("API_KEY") {
            self.weather.api_key = Some(key);
        }

        // Publisher overrides
        if let Some(location) = lookup("SKYCAST_LOCATION") {
            self.publisher.location = location;
        }

        // Logging overrides
        if let Some(level) = lookup("SKYCAST_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SKYCAST_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    pub fn weather_client_config(&self) -> WeatherClientConfig {
        WeatherClientConfig {
            endpoint: self.weather.endpoint.clone(),
            api_key: self.weather.api_key.clone(),
            units: self.weather.units.clone(),
            request_timeout_ms: self.weather.request_timeout_secs.saturating_mul(1000),
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            max_subscribers: self.subscribers.max_subscribers,
            queue_capacity: self.subscribers.queue_capacity,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            write_timeout: Duration::from_secs(self.subscribers.write_timeout_secs),
        }
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            poll_interval: Duration::from_secs(self.publisher.poll_interval_secs),
            retry_backoff: Duration::from_secs(self.publisher.retry_backoff_secs),
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
    r#"# Skycast Configuration
#
# Environment variables override these settings:
# - SKYCAST_HOST
# - SKYCAST_PORT
# - SKYCAST_STATIC_DIR
# - SKYCAST_LOCATION
# - SKYCAST_WEATHER_ENDPOINT
# - SKYCAST_LOG_LEVEL
# - SKYCAST_LOG_FORMAT
# - API_KEY (weather API credential)

[server]
# Server host
host = "0.0.0.0"

# Server port
port = 8000

# Directory with the dashboard page and assets, served at /
static_dir = "./templates"

[weather]
# Current-conditions endpoint
endpoint = "http://api.openweathermap.org/data/2.5/weather"

# Credential, prefer the API_KEY environment variable
# api_key = ""

# Unit system requested from the API
units = "metric"

# Request timeout in seconds
request_timeout_secs = 10

[publisher]
# Location published at startup
location = "Phnom Penh"

# Seconds between successful polls
poll_interval_secs = 3

# Seconds to wait after a failed fetch
retry_backoff_secs = 5

[subscribers]
# Undelivered updates a subscriber may queue before it is dropped
queue_capacity = 10

# Seconds a single WebSocket write may take
write_timeout_secs = 5

# Connections refused beyond this count
max_subscribers = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

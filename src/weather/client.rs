//! Weather API Client
//!
//! HTTP client for the OpenWeatherMap current-weather endpoint.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use thiserror::Error;

use super::snapshot::WeatherSnapshot;

/// Default current-weather endpoint
pub const DEFAULT_ENDPOINT: &str = "http://api.openweathermap.org/data/2.5/weather";

/// Anything that can produce current weather for a named location
///
/// The publisher only depends on this trait, so tests can drive it with a
/// canned source instead of the network.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch current weather for `location`
    async fn fetch(&self, location: &str) -> Result<WeatherSnapshot, WeatherError>;
}

/// Weather API client
pub struct WeatherClient {
    client: Client,
    config: WeatherClientConfig,
}

/// Configuration for the weather client
#[derive(Debug, Clone)]
pub struct WeatherClientConfig {
    /// Full URL of the current-weather endpoint
    pub endpoint: String,
    /// API credential; required for every fetch
    pub api_key: Option<String>,
    /// Unit system requested from the API
    pub units: String,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for WeatherClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            units: "metric".to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

impl WeatherClient {
    /// Create a new weather client with the given configuration
    pub fn new(config: WeatherClientConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    /// Fetch and decode current weather for `location`
    ///
    /// Performs exactly one request with the wire parameters `q` (location),
    /// `appid` (credential) and `units`. Retrying is up to the caller.
    pub async fn fetch(&self, location: &str) -> Result<WeatherSnapshot, WeatherError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| {
                WeatherError::Config("API_KEY environment variable is not set".to_string())
            })?;

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("q", location),
                ("appid", api_key),
                ("units", self.config.units.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(WeatherError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.bytes().await?;
        let snapshot = WeatherSnapshot::from_json(&body, Utc::now())?;

        tracing::debug!(
            location = %snapshot.location,
            temperature = snapshot.temperature,
            "Fetched current weather"
        );

        Ok(snapshot)
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn fetch(&self, location: &str) -> Result<WeatherSnapshot, WeatherError> {
        WeatherClient::fetch(self, location).await
    }
}

/// Errors that can occur when fetching weather
#[derive(Error, Debug)]
pub enum WeatherError {
    /// Missing or invalid credential. Retrying will not help.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed weather response: {0}")]
    Decode(String),
}

impl WeatherError {
    /// Bad status or undecodable body
    pub fn is_protocol(&self) -> bool {
        matches!(self, WeatherError::Status { .. } | WeatherError::Decode(_))
    }

    /// Errors that no amount of retrying will fix
    pub fn is_fatal(&self) -> bool {
        matches!(self, WeatherError::Config(_))
    }
}

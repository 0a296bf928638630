//! Weather Snapshot
//!
//! The decoded, immutable view of one current-weather observation, plus the
//! wire types used to decode the OpenWeatherMap response body.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::client::WeatherError;

/// Geographic coordinates of the observation
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Current weather for one location
///
/// Temperatures are in degrees Celsius, wind speed in meters per second and
/// visibility in meters, as returned by the API in metric units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    /// Location name as reported by the API
    pub location: String,
    pub coordinates: Coordinates,
    pub temperature: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// Relative humidity in percent
    pub humidity: u32,
    /// Wind speed in m/s
    pub wind_speed: f64,
    /// Visibility in meters
    pub visibility: u32,
    /// Short condition group (e.g. "Clouds")
    pub condition: String,
    /// Human readable condition (e.g. "broken clouds")
    pub description: String,
    /// When the API says the observation was taken
    pub observed_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    /// Decode a response body into a snapshot
    ///
    /// `fetched_at` is used when the body carries no observation time.
    pub fn from_json(body: &[u8], fetched_at: DateTime<Utc>) -> Result<Self, WeatherError> {
        let response: CurrentWeatherResponse =
            serde_json::from_slice(body).map_err(|e| WeatherError::Decode(e.to_string()))?;
        response.into_snapshot(fetched_at)
    }
}

// ============================================
// Wire types
// ============================================

/// Subset of the current-weather response we care about.
/// Unknown fields are ignored so API additions never break decoding.
#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    #[serde(default)]
    coord: Coordinates,
    #[serde(default)]
    weather: Vec<Condition>,
    main: MainMeasurements,
    #[serde(default)]
    visibility: u32,
    #[serde(default)]
    wind: Wind,
    #[serde(default)]
    dt: Option<i64>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct Condition {
    #[serde(default)]
    main: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct MainMeasurements {
    temp: f64,
    temp_min: f64,
    temp_max: f64,
    humidity: u32,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f64,
}

impl CurrentWeatherResponse {
    fn into_snapshot(self, fetched_at: DateTime<Utc>) -> Result<WeatherSnapshot, WeatherError> {
        // The first condition is the primary one
        let condition = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::Decode("response has no weather conditions".to_string()))?;

        let observed_at = self
            .dt
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .unwrap_or(fetched_at);

        Ok(WeatherSnapshot {
            location: self.name,
            coordinates: self.coord,
            temperature: self.main.temp,
            temp_min: self.main.temp_min,
            temp_max: self.main.temp_max,
            humidity: self.main.humidity,
            wind_speed: self.wind.speed,
            visibility: self.visibility,
            condition: condition.main,
            description: condition.description,
            observed_at,
        })
    }
}

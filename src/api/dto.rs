//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};

/// Form posted by the dashboard's city picker
#[derive(Debug, Deserialize)]
pub struct UpdateCityForm {
    /// New location name; missing is treated like empty
    #[serde(default)]
    pub city: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded"
    pub status: String,
    /// Location currently published
    pub location: String,
    /// Live WebSocket subscribers
    pub subscribers: usize,
    /// Whether at least one fetch has succeeded
    pub weather_available: bool,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}

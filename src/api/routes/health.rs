//! Health Routes
//!
//! Health check endpoints for monitoring.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::HealthResponse;
use crate::api::state::AppState;

/// GET /health/live
///
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health
///
/// Full health status. "degraded" until the first weather fetch succeeds.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let weather_available = state.latest.is_available().await;
    let status = if weather_available { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        location: state.target().name(),
        subscribers: state.subscriber_count().await,
        weather_available,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}

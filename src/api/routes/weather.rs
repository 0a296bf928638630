//! Weather Routes
//!
//! - GET /api/weather - Latest snapshot as JSON

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::weather::WeatherSnapshot;

/// GET /api/weather
///
/// 404 until the publisher has fetched successfully at least once.
pub async fn latest_weather(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<WeatherSnapshot>> {
    state
        .latest
        .get()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No weather data available yet".to_string()))
}

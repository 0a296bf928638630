//! Location Routes
//!
//! - POST /update-city - Change the published location (field `city`)

use axum::{
    extract::{rejection::FormRejection, Query, State},
    http::StatusCode,
    Form,
};
use std::sync::Arc;

use crate::api::dto::UpdateCityForm;
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// POST /update-city
///
/// Swaps the target location and resets every live subscriber onto it.
/// `city` is read from a urlencoded body, falling back to the query string.
/// A missing or blank city is rejected with 400 and changes nothing.
pub async fn update_city(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UpdateCityForm>,
    form: Result<Form<UpdateCityForm>, FormRejection>,
) -> ApiResult<StatusCode> {
    let city = form
        .ok()
        .map(|Form(form)| form.city)
        .filter(|city| !city.trim().is_empty())
        .unwrap_or(query.city);

    let target = state.registry.retarget(&city).await?;

    tracing::info!(location = %target.name, epoch = target.epoch, "City updated");
    Ok(StatusCode::OK)
}

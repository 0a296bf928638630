//! Weather Data
//!
//! Fetching and presenting current weather.
//!
//! - **Client**: REST client for the weather API, behind the [`WeatherSource`] trait
//! - **Snapshot**: Decoded observation for one location
//! - **Format**: Renders a snapshot as dashboard HTML fragments

mod client;
pub mod format;
mod snapshot;

pub use client::{WeatherClient, WeatherClientConfig, WeatherError, WeatherSource, DEFAULT_ENDPOINT};
pub use format::render_update;
pub use snapshot::{Coordinates, WeatherSnapshot};

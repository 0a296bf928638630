//! # Skycast
//!
//! Live weather dashboard backend. A background publisher polls a weather
//! API for one target location, renders each reading as htmx out-of-band
//! fragments and pushes them to every connected browser over WebSocket.
//!
//! ## Modules
//!
//! - [`weather`]: Weather API client, snapshot decoding and fragment rendering
//! - [`location`]: The shared, replaceable target location
//! - [`websocket`]: Subscriber registry and per-connection sessions
//! - [`publisher`]: The poll, render, broadcast loop
//! - [`api`]: HTTP server with Axum
//! - [`config`]: TOML and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use skycast::*;
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_with_env(None)?;
//!
//!     let target = TargetLocation::new(&config.publisher.location)?;
//!     let registry = Arc::new(SubscriberRegistry::new(config.registry_config(), target));
//!     let source = Arc::new(WeatherClient::new(config.weather_client_config())?);
//!     let latest = LatestWeather::default();
//!     let shutdown = CancellationToken::new();
//!
//!     UpdatePublisher::new(source, Arc::clone(&registry), latest.clone(), config.publisher_config())
//!         .start(shutdown.clone());
//!
//!     let state = AppState::new(config.server.clone(), registry, latest, config.session_config(), shutdown);
//!     serve(state, &config.server).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod location;
pub mod publisher;
pub mod weather;
pub mod websocket;

// Re-export top-level types for convenience
pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig, ServerConfig};

pub use location::{LocationError, Target, TargetLocation};

pub use publisher::{LatestWeather, PublisherConfig, PublisherError, UpdatePublisher};

pub use weather::{
    render_update, Coordinates, WeatherClient, WeatherClientConfig, WeatherError,
    WeatherSnapshot, WeatherSource,
};

pub use websocket::{
    websocket_handler, BroadcastReport, ConnectionSession, Payload, RegistryConfig,
    RegistryError, SessionConfig, SessionError, Subscriber, SubscriberId, SubscriberRegistry,
};

//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::location::TargetLocation;
use crate::publisher::LatestWeather;
use crate::websocket::{SessionConfig, SubscriberRegistry};

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Live WebSocket subscribers
    pub registry: Arc<SubscriberRegistry>,
    /// Most recent snapshot from the publisher
    pub latest: LatestWeather,
    /// Settings applied to every new session
    pub session: SessionConfig,
    /// Cancelled on process shutdown; sessions hang off child tokens
    pub shutdown: CancellationToken,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState
    pub fn new(
        config: ServerConfig,
        registry: Arc<SubscriberRegistry>,
        latest: LatestWeather,
        session: SessionConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            latest,
            session,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// The location currently being published
    pub fn target(&self) -> &TargetLocation {
        self.registry.target()
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Get live subscriber count
    pub async fn subscriber_count(&self) -> usize {
        self.registry.len().await
    }
}

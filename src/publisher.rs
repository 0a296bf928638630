//! Update Publisher
//!
//! Background loop that polls the weather source for the current target
//! location, renders the result and broadcasts it to every subscriber.
//! Transient failures back off and retry; only a missing credential stops it.

use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::location::Target;
use crate::weather::{render_update, WeatherError, WeatherSnapshot, WeatherSource};
use crate::websocket::{BroadcastReport, Payload, SubscriberRegistry};

/// Configuration for the publish loop
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Delay between successful cycles
    pub poll_interval: Duration,
    /// Delay after a failed fetch
    pub retry_backoff: Duration,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            retry_backoff: Duration::from_secs(5),
        }
    }
}

/// Most recent successfully fetched snapshot
#[derive(Clone, Default)]
pub struct LatestWeather {
    inner: Arc<RwLock<Option<WeatherSnapshot>>>,
}

impl LatestWeather {
    pub async fn get(&self) -> Option<WeatherSnapshot> {
        self.inner.read().await.clone()
    }

    pub async fn is_available(&self) -> bool {
        self.inner.read().await.is_some()
    }

    pub(crate) async fn set(&self, snapshot: WeatherSnapshot) {
        *self.inner.write().await = Some(snapshot);
    }
}

/// Periodically fetches weather and fans it out
pub struct UpdatePublisher {
    source: Arc<dyn WeatherSource>,
    registry: Arc<SubscriberRegistry>,
    latest: LatestWeather,
    config: PublisherConfig,
}

impl UpdatePublisher {
    /// Create a new publisher
    pub fn new(
        source: Arc<dyn WeatherSource>,
        registry: Arc<SubscriberRegistry>,
        latest: LatestWeather,
        config: PublisherConfig,
    ) -> Self {
        Self {
            source,
            registry,
            latest,
            config,
        }
    }

    /// Spawn the publish loop
    pub fn start(self, shutdown: CancellationToken) -> JoinHandle<Result<(), PublisherError>> {
        tokio::spawn(self.run(shutdown))
    }

    /// Run until `shutdown` is cancelled or a fatal error occurs
    ///
    /// A change of target location cuts the current wait short so the new
    /// location is published right away.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), PublisherError> {
        let target = self.registry.target().clone();
        let mut changes = target.subscribe();

        tracing::info!(
            location = %target.name(),
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "Starting weather publisher"
        );

        loop {
            let current = target.current();

            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.publish(&current) => outcome,
            };

            let wait = match outcome {
                Ok(report) => {
                    tracing::debug!(
                        location = %current.name,
                        delivered = report.delivered,
                        dropped_slow = report.dropped_slow,
                        stale = report.stale,
                        "Published weather update"
                    );
                    self.config.poll_interval
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "Weather publisher cannot continue");
                    return Err(PublisherError::Fatal(e));
                }
                Err(e) => {
                    tracing::warn!(location = %current.name, error = %e, "Error fetching weather data");
                    self.config.retry_backoff
                }
            };

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    tracing::debug!("Target location changed, publishing now");
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }

        tracing::info!("Weather publisher stopped");
        Ok(())
    }

    /// Run one fetch, render and broadcast cycle for `target`
    pub async fn publish(&self, target: &Target) -> Result<BroadcastReport, WeatherError> {
        let snapshot = self.source.fetch(&target.name).await?;
        let body = render_update(&snapshot, &Local::now());

        // Don't let a slow fetch for an old location overwrite a newer one
        if self.registry.target().epoch() == target.epoch {
            self.latest.set(snapshot).await;
        }

        Ok(self
            .registry
            .broadcast(&Payload::new(target.epoch, body))
            .await)
    }
}

/// Errors that stop the publisher
#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Publisher stopped: {0}")]
    Fatal(#[source] WeatherError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::TargetLocation;
    use crate::weather::Coordinates;
    use crate::websocket::RegistryConfig;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Echoes the requested location back, or fails every call
    #[derive(Default)]
    struct MockSource {
        calls: AtomicUsize,
        requested: Mutex<Vec<String>>,
        failure: Option<fn() -> WeatherError>,
    }

    #[async_trait]
    impl WeatherSource for MockSource {
        async fn fetch(&self, location: &str) -> Result<WeatherSnapshot, WeatherError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().push(location.to_string());
            if let Some(failure) = self.failure {
                return Err(failure());
            }
            Ok(snapshot(location))
        }
    }

    fn snapshot(location: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            location: location.to_string(),
            coordinates: Coordinates::default(),
            temperature: 30.2,
            temp_min: 29.0,
            temp_max: 31.0,
            humidity: 70,
            wind_speed: 2.5,
            visibility: 8000,
            condition: "Rain".to_string(),
            description: "light rain".to_string(),
            observed_at: Utc::now(),
        }
    }

    fn registry() -> Arc<SubscriberRegistry> {
        Arc::new(SubscriberRegistry::new(
            RegistryConfig::default(),
            TargetLocation::new("Phnom Penh").unwrap(),
        ))
    }

    fn config(poll_ms: u64, backoff_ms: u64) -> PublisherConfig {
        PublisherConfig {
            poll_interval: Duration::from_millis(poll_ms),
            retry_backoff: Duration::from_millis(backoff_ms),
        }
    }

    #[test]
    fn test_default_config() {
        let config = PublisherConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(3));
        assert_eq!(config.retry_backoff, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_subscriber_receives_update_within_interval() {
        let registry = registry();
        let mut sub = registry.new_subscriber(CancellationToken::new());
        registry.register(&sub).await.unwrap();

        let latest = LatestWeather::default();
        let publisher = UpdatePublisher::new(
            Arc::new(MockSource::default()),
            Arc::clone(&registry),
            latest.clone(),
            PublisherConfig::default(),
        );
        let shutdown = CancellationToken::new();
        let handle = publisher.start(shutdown.clone());

        let payload = tokio::time::timeout(Duration::from_secs(3), sub.recv())
            .await
            .expect("update within one poll interval")
            .unwrap();
        assert!(payload
            .as_str()
            .contains("<div hx-swap-oob=\"innerHTML:#weather-data-name\">Phnom Penh</div>"));
        assert_eq!(payload.epoch, 0);
        assert_eq!(latest.get().await.unwrap().location, "Phnom Penh");

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_loop() {
        let source = Arc::new(MockSource {
            failure: Some(|| WeatherError::Status {
                status: 503,
                message: "unavailable".to_string(),
            }),
            ..Default::default()
        });
        let publisher = UpdatePublisher::new(
            source.clone(),
            registry(),
            LatestWeather::default(),
            config(1_000, 10),
        );
        let shutdown = CancellationToken::new();
        let handle = publisher.start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(source.calls.load(Ordering::SeqCst) >= 3);
        assert!(!handle.is_finished());

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_missing_credential_is_fatal() {
        let source = Arc::new(MockSource {
            failure: Some(|| WeatherError::Config("API_KEY environment variable is not set".into())),
            ..Default::default()
        });
        let publisher = UpdatePublisher::new(
            source.clone(),
            registry(),
            LatestWeather::default(),
            config(10, 10),
        );

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            publisher.run(CancellationToken::new()),
        )
        .await
        .unwrap();

        assert!(matches!(result, Err(PublisherError::Fatal(WeatherError::Config(_)))));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retarget_publishes_new_location_immediately() {
        let registry = registry();
        let mut sub = registry.new_subscriber(CancellationToken::new());
        registry.register(&sub).await.unwrap();

        let source = Arc::new(MockSource::default());
        // Long interval: only a retarget can trigger the second cycle in time
        let publisher = UpdatePublisher::new(
            source.clone(),
            Arc::clone(&registry),
            LatestWeather::default(),
            config(60_000, 60_000),
        );
        let shutdown = CancellationToken::new();
        let handle = publisher.start(shutdown.clone());

        let first = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.as_str().contains("Phnom Penh"));

        registry.retarget("Hanoi").await.unwrap();

        let second = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .expect("retarget should trigger a fresh cycle")
            .unwrap();
        assert!(second.as_str().contains("Hanoi"));
        assert_eq!(second.epoch, 1);
        assert_eq!(
            *source.requested.lock().unwrap(),
            vec!["Phnom Penh".to_string(), "Hanoi".to_string()]
        );

        shutdown.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_publish_once_reports_delivery() {
        let registry = registry();
        let sub = registry.new_subscriber(CancellationToken::new());
        registry.register(&sub).await.unwrap();

        let publisher = UpdatePublisher::new(
            Arc::new(MockSource::default()),
            Arc::clone(&registry),
            LatestWeather::default(),
            PublisherConfig::default(),
        );

        let report = publisher
            .publish(&registry.target().current())
            .await
            .unwrap();
        assert_eq!(report.delivered, 1);
        assert!(!report.stale);
    }
}

//! Subscriber Registry
//!
//! Tracks every live WebSocket subscriber and fans payloads out to them.
//!
//! The registry never owns a subscriber's queue: it keeps a weak sender and
//! the session's cancellation token. Delivery is a non-blocking `try_send`,
//! so one slow browser can never hold up the others; a subscriber whose
//! queue is full is evicted and its session cancelled.

use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::messages::Payload;
use crate::location::{LocationError, Target, TargetLocation};

/// Opaque identity of one subscriber, only used for membership and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// One live connection's end of the fan-out
///
/// Owned by its session. Holding the strong sender here is what keeps the
/// registry's weak entry alive.
pub struct Subscriber {
    id: SubscriberId,
    pub(crate) tx: mpsc::Sender<Payload>,
    pub(crate) rx: mpsc::Receiver<Payload>,
    pub(crate) cancel: CancellationToken,
}

impl Subscriber {
    /// Create a subscriber with a bounded queue of `capacity` payloads
    pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            id: SubscriberId::new(),
            tx,
            rx,
            cancel,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Token cancelled when this subscriber should stop
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for the next queued payload
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    /// Take the next queued payload without waiting
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }
}

/// Configuration for the subscriber registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of concurrent subscribers
    pub max_subscribers: usize,
    /// Outbound queue capacity per subscriber
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 1000,
            queue_capacity: 10,
        }
    }
}

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the payload was queued for
    pub delivered: usize,
    /// Subscribers evicted because their queue was full
    pub dropped_slow: usize,
    /// Entries whose session had already gone away
    pub pruned: usize,
    /// The payload was for an old target location and was discarded
    pub stale: bool,
}

/// Registry entry: a weak reference to the subscriber's queue
struct Entry {
    sender: mpsc::WeakSender<Payload>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<SubscriberId, Entry>,
    /// Most recent payload of the current epoch, replayed to newcomers
    retained: Option<Payload>,
}

/// Thread-safe set of active subscribers
pub struct SubscriberRegistry {
    state: Mutex<RegistryState>,
    target: TargetLocation,
    config: RegistryConfig,
}

impl SubscriberRegistry {
    /// Create an empty registry bound to `target`
    pub fn new(config: RegistryConfig, target: TargetLocation) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            target,
            config,
        }
    }

    /// Create a subscriber sized for this registry
    pub fn new_subscriber(&self, cancel: CancellationToken) -> Subscriber {
        Subscriber::new(self.config.queue_capacity, cancel)
    }

    /// Register a subscriber
    ///
    /// If a payload for the current target has already gone out, the new
    /// subscriber gets it straight away.
    pub async fn register(&self, subscriber: &Subscriber) -> Result<(), RegistryError> {
        let mut state = self.state.lock().await;
        if state.entries.len() >= self.config.max_subscribers {
            return Err(RegistryError::Full {
                limit: self.config.max_subscribers,
            });
        }

        state.entries.insert(
            subscriber.id(),
            Entry {
                sender: subscriber.tx.downgrade(),
                cancel: subscriber.cancel.clone(),
            },
        );

        if let Some(payload) = &state.retained {
            if !payload.is_stale(self.target.epoch()) {
                let _ = subscriber.tx.try_send(payload.clone());
            }
        }

        tracing::info!(
            subscriber_id = %subscriber.id(),
            subscribers = state.entries.len(),
            "Added subscriber"
        );
        Ok(())
    }

    /// Remove a subscriber. Returns false if it was not registered.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let mut state = self.state.lock().await;
        let removed = state.entries.remove(&id).is_some();
        if removed {
            tracing::info!(
                subscriber_id = %id,
                subscribers = state.entries.len(),
                "Removed subscriber"
            );
        }
        removed
    }

    /// Queue `payload` for every subscriber without waiting on any of them
    pub async fn broadcast(&self, payload: &Payload) -> BroadcastReport {
        let mut state = self.state.lock().await;
        let mut report = BroadcastReport::default();

        let current_epoch = self.target.epoch();
        if payload.is_stale(current_epoch) {
            tracing::debug!(
                payload_epoch = payload.epoch,
                current_epoch,
                "Discarding payload for previous location"
            );
            report.stale = true;
            return report;
        }

        state.retained = Some(payload.clone());

        let mut evicted = Vec::new();
        for (id, entry) in &state.entries {
            let Some(sender) = entry.sender.upgrade() else {
                report.pruned += 1;
                evicted.push(*id);
                continue;
            };

            match sender.try_send(payload.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = %id, "Dropping slow subscriber");
                    entry.cancel.cancel();
                    report.dropped_slow += 1;
                    evicted.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    report.pruned += 1;
                    evicted.push(*id);
                }
            }
        }

        for id in evicted {
            state.entries.remove(&id);
        }

        tracing::trace!(
            delivered = report.delivered,
            dropped_slow = report.dropped_slow,
            pruned = report.pruned,
            "Broadcast payload"
        );

        report
    }

    /// Point the system at a new location
    ///
    /// The name swap, epoch bump and forgetting of the retained payload
    /// happen under the registry lock, so no broadcast can interleave.
    pub async fn retarget(&self, name: &str) -> Result<Target, LocationError> {
        let mut state = self.state.lock().await;
        let target = self.target.replace(name)?;
        state.retained = None;

        tracing::info!(
            location = %target.name,
            epoch = target.epoch,
            subscribers = state.entries.len(),
            "Target location changed"
        );
        Ok(target)
    }

    /// The location this registry's payloads are rendered for
    pub fn target(&self) -> &TargetLocation {
        &self.target
    }

    /// Number of registered subscribers
    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.state.lock().await.entries.contains_key(&id)
    }
}

/// Errors that can occur in the subscriber registry
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Too many subscribers (limit: {limit})")]
    Full { limit: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn registry(config: RegistryConfig) -> SubscriberRegistry {
        SubscriberRegistry::new(config, TargetLocation::new("Phnom Penh").unwrap())
    }

    fn subscriber(registry: &SubscriberRegistry) -> Subscriber {
        registry.new_subscriber(CancellationToken::new())
    }

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.max_subscribers, 1000);
        assert_eq!(config.queue_capacity, 10);
    }

    #[tokio::test]
    async fn test_register_unregister() {
        let registry = registry(RegistryConfig::default());
        let sub = subscriber(&registry);

        registry.register(&sub).await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(sub.id()).await);

        assert!(registry.unregister(sub.id()).await);
        assert!(registry.is_empty().await);

        // Second teardown is a no-op
        assert!(!registry.unregister(sub.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_membership_matches_net_operations() {
        let registry = registry(RegistryConfig::default());
        let subs: Vec<Subscriber> = (0..6).map(|_| subscriber(&registry)).collect();
        let mut expected = HashSet::new();

        // (index, add?) pairs, including repeated removals
        let ops = [
            (0, true),
            (1, true),
            (2, true),
            (1, false),
            (1, false),
            (3, true),
            (4, true),
            (0, false),
            (5, false),
            (5, true),
            (3, false),
            (2, false),
            (2, false),
        ];

        for (index, add) in ops {
            let sub = &subs[index];
            if add {
                registry.register(sub).await.unwrap();
                expected.insert(sub.id());
            } else {
                registry.unregister(sub.id()).await;
                expected.remove(&sub.id());
            }
        }

        assert_eq!(registry.len().await, expected.len());
        for sub in &subs {
            assert_eq!(registry.contains(sub.id()).await, expected.contains(&sub.id()));
        }
    }

    #[tokio::test]
    async fn test_subscriber_limit() {
        let registry = registry(RegistryConfig {
            max_subscribers: 2,
            queue_capacity: 4,
        });

        let a = subscriber(&registry);
        let b = subscriber(&registry);
        let c = subscriber(&registry);

        registry.register(&a).await.unwrap();
        registry.register(&b).await.unwrap();
        assert_eq!(
            registry.register(&c).await.unwrap_err(),
            RegistryError::Full { limit: 2 }
        );

        registry.unregister(a.id()).await;
        registry.register(&c).await.unwrap();
    }

    #[tokio::test]
    async fn test_broadcast_delivers_in_order_to_all() {
        let registry = registry(RegistryConfig {
            max_subscribers: 16,
            queue_capacity: 64,
        });

        let mut subs: Vec<Subscriber> = (0..5).map(|_| subscriber(&registry)).collect();
        for sub in &subs {
            registry.register(sub).await.unwrap();
        }

        for n in 0..20 {
            let report = registry
                .broadcast(&Payload::new(0, format!("update {}", n)))
                .await;
            assert_eq!(report.delivered, 5);
        }

        for sub in &mut subs {
            for n in 0..20 {
                let payload = sub.try_recv().unwrap();
                assert_eq!(payload.as_str(), format!("update {}", n));
            }
            assert!(sub.try_recv().is_none());
        }
    }

    #[tokio::test]
    async fn test_full_queue_evicts_only_slow_subscriber() {
        let registry = registry(RegistryConfig {
            max_subscribers: 16,
            queue_capacity: 2,
        });

        let slow = subscriber(&registry);
        let mut fast = subscriber(&registry);
        registry.register(&slow).await.unwrap();
        registry.register(&fast).await.unwrap();

        for n in 0..3 {
            registry.broadcast(&Payload::new(0, format!("u{}", n))).await;
            // The fast one keeps up
            assert_eq!(fast.try_recv().unwrap().as_str(), format!("u{}", n));
        }

        assert!(!registry.contains(slow.id()).await);
        assert!(slow.cancellation().is_cancelled());
        assert!(registry.contains(fast.id()).await);
        assert!(!fast.cancellation().is_cancelled());

        let report = registry.broadcast(&Payload::new(0, "u3")).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.dropped_slow, 0);
    }

    #[tokio::test]
    async fn test_broadcast_reports_slow_drop() {
        let registry = registry(RegistryConfig {
            max_subscribers: 16,
            queue_capacity: 1,
        });
        let slow = subscriber(&registry);
        registry.register(&slow).await.unwrap();

        let first = registry.broadcast(&Payload::new(0, "a")).await;
        assert_eq!(first.delivered, 1);

        let second = registry.broadcast(&Payload::new(0, "b")).await;
        assert_eq!(second.delivered, 0);
        assert_eq!(second.dropped_slow, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_pruned() {
        let registry = registry(RegistryConfig::default());
        let sub = subscriber(&registry);
        registry.register(&sub).await.unwrap();

        // Session vanished without tearing down
        drop(sub);

        let report = registry.broadcast(&Payload::new(0, "x")).await;
        assert_eq!(report.pruned, 1);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_retained_payload_replayed_to_newcomer() {
        let registry = registry(RegistryConfig::default());
        registry.broadcast(&Payload::new(0, "latest")).await;

        let mut late = subscriber(&registry);
        registry.register(&late).await.unwrap();
        assert_eq!(late.try_recv().unwrap().as_str(), "latest");
    }

    #[tokio::test]
    async fn test_retarget_discards_old_payloads() {
        let registry = registry(RegistryConfig::default());
        let mut sub = subscriber(&registry);
        registry.register(&sub).await.unwrap();
        registry.broadcast(&Payload::new(0, "phnom penh")).await;

        let target = registry.retarget("Hanoi").await.unwrap();
        assert_eq!(target.epoch, 1);
        assert_eq!(registry.target().name(), "Hanoi");

        // A cycle that started before the change must not be delivered
        let report = registry.broadcast(&Payload::new(0, "late phnom penh")).await;
        assert!(report.stale);
        assert_eq!(report.delivered, 0);

        // Retained payload was forgotten
        let mut newcomer = subscriber(&registry);
        registry.register(&newcomer).await.unwrap();
        assert!(newcomer.try_recv().is_none());

        registry.broadcast(&Payload::new(1, "hanoi")).await;
        assert_eq!(sub.try_recv().unwrap().as_str(), "phnom penh");
        assert_eq!(sub.try_recv().unwrap().as_str(), "hanoi");
        assert_eq!(newcomer.try_recv().unwrap().as_str(), "hanoi");
    }

    #[tokio::test]
    async fn test_retarget_rejects_blank() {
        let registry = registry(RegistryConfig::default());
        assert_eq!(
            registry.retarget("  ").await.unwrap_err(),
            LocationError::Empty
        );
        assert_eq!(registry.target().epoch(), 0);
        assert_eq!(registry.target().name(), "Phnom Penh");
    }
}

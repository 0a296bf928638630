//! Connection Session
//!
//! Drives one subscriber from registration to teardown:
//! `Connecting -> Active -> Closing -> Closed`.
//!
//! While active, the session relays queued payloads to its transport, one
//! bounded write at a time. Cancellation (client gone, evicted as a slow
//! consumer, or process shutdown) always takes priority over the next write.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::messages::Payload;
use super::registry::{RegistryError, Subscriber, SubscriberId, SubscriberRegistry};
use crate::location::Target;

/// Outbound half of a client connection
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame
    async fn send_text(&mut self, text: &str) -> Result<(), TransportError>;

    /// Say goodbye and release the connection. Errors are not interesting here.
    async fn close(&mut self);
}

/// A transport write failed
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Configuration for connection sessions
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on a single frame write
    pub write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Active,
    Closing,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Connecting => "connecting",
            SessionState::Active => "active",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One live subscriber connection
pub struct ConnectionSession<T: Transport> {
    subscriber: Subscriber,
    registry: Arc<SubscriberRegistry>,
    target: watch::Receiver<Target>,
    transport: T,
    config: SessionConfig,
    state: SessionState,
    /// Fresh payload pulled off the queue while draining stale ones
    pending: Option<Payload>,
}

impl<T: Transport> ConnectionSession<T> {
    /// Register a new subscriber for `transport`
    ///
    /// `cancel` should be tied to the connection's lifetime. If the registry
    /// refuses the subscriber the transport is closed before returning.
    pub async fn open(
        registry: Arc<SubscriberRegistry>,
        mut transport: T,
        config: SessionConfig,
        cancel: CancellationToken,
    ) -> Result<Self, SessionError> {
        let subscriber = registry.new_subscriber(cancel);
        let target = registry.target().subscribe();

        if let Err(e) = registry.register(&subscriber).await {
            transport.close().await;
            return Err(SessionError::Rejected(e));
        }

        let mut session = Self {
            subscriber,
            registry,
            target,
            transport,
            config,
            state: SessionState::Connecting,
            pending: None,
        };
        session.transition(SessionState::Active);
        Ok(session)
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber.id()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Relay payloads until cancelled or a write fails, then tear down
    ///
    /// Returns `Ok` when the session ended through cancellation. The
    /// subscriber is unregistered in every case.
    pub async fn run(mut self) -> Result<(), SessionError> {
        let result = self.relay().await;
        self.teardown().await;
        result
    }

    async fn relay(&mut self) -> Result<(), SessionError> {
        let cancel = self.subscriber.cancellation().clone();

        loop {
            if let Some(payload) = self.pending.take() {
                if !self.write(&payload, &cancel).await? {
                    return Ok(());
                }
                continue;
            }

            tokio::select! {
                biased;

                _ = cancel.cancelled() => return Ok(()),

                changed = self.target.changed() => {
                    if changed.is_err() {
                        return Ok(());
                    }
                    let drained = self.drain_stale();
                    tracing::debug!(
                        subscriber_id = %self.subscriber.id(),
                        drained,
                        "Target location changed, dropped queued updates"
                    );
                }

                next = self.subscriber.rx.recv() => {
                    let Some(payload) = next else {
                        return Ok(());
                    };
                    if payload.is_stale(self.current_epoch()) {
                        continue;
                    }
                    if !self.write(&payload, &cancel).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Write one frame. Returns false if cancelled first.
    async fn write(
        &mut self,
        payload: &Payload,
        cancel: &CancellationToken,
    ) -> Result<bool, SessionError> {
        let limit = self.config.write_timeout;

        tokio::select! {
            biased;

            _ = cancel.cancelled() => Ok(false),

            result = tokio::time::timeout(limit, self.transport.send_text(payload.as_str())) => {
                match result {
                    Ok(Ok(())) => Ok(true),
                    Ok(Err(e)) => Err(SessionError::Transport(e)),
                    Err(_) => Err(SessionError::WriteTimeout(limit)),
                }
            }
        }
    }

    /// Throw away queued payloads rendered for an older location
    fn drain_stale(&mut self) -> usize {
        let current = self.current_epoch();
        let mut drained = 0;

        // Older payloads always sit in front of newer ones
        while let Ok(payload) = self.subscriber.rx.try_recv() {
            if payload.is_stale(current) {
                drained += 1;
            } else {
                self.pending = Some(payload);
                break;
            }
        }
        drained
    }

    fn current_epoch(&self) -> u64 {
        self.target.borrow().epoch
    }

    async fn teardown(&mut self) {
        self.transition(SessionState::Closing);
        self.registry.unregister(self.subscriber.id()).await;
        let _ = tokio::time::timeout(self.config.write_timeout, self.transport.close()).await;
        self.transition(SessionState::Closed);
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!(
            subscriber_id = %self.subscriber.id(),
            from = %self.state,
            to = %next,
            "Session state change"
        );
        self.state = next;
    }
}

/// Errors that end a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Subscriber rejected: {0}")]
    Rejected(#[from] RegistryError),

    #[error("Write timed out after {0:?}")]
    WriteTimeout(Duration),

    #[error("Failed to write message: {0}")]
    Transport(#[from] TransportError),
}

//! WebSocket Message Types
//!
//! Server-to-client frames are rendered HTML fragments. Each one is tagged
//! with the target-location epoch it was rendered for.

use std::sync::Arc;

/// A rendered update queued for delivery to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Epoch of the target location this payload describes
    pub epoch: u64,
    body: Arc<str>,
}

impl Payload {
    pub fn new(epoch: u64, body: impl Into<Arc<str>>) -> Self {
        Self {
            epoch,
            body: body.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.body
    }

    /// True if the target location has moved on since this was rendered
    pub fn is_stale(&self, current_epoch: u64) -> bool {
        self.epoch < current_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_clone_shares_body() {
        let payload = Payload::new(3, "<div>hi</div>".to_string());
        let copy = payload.clone();
        assert_eq!(copy.as_str(), "<div>hi</div>");
        assert_eq!(copy, payload);
    }

    #[test]
    fn test_staleness() {
        let payload = Payload::new(2, "x");
        assert!(!payload.is_stale(2));
        assert!(!payload.is_stale(1));
        assert!(payload.is_stale(3));
    }
}

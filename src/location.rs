//! Target Location
//!
//! The location the publisher polls, shared between the publisher, the
//! admin endpoint and every session. Each change bumps an epoch so payloads
//! rendered for an older location can be recognised and dropped.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

/// A location name together with the epoch it was set in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    /// Starts at 0, incremented by every change
    pub epoch: u64,
}

/// Atomically swapped, observable target location
#[derive(Clone)]
pub struct TargetLocation {
    tx: Arc<watch::Sender<Target>>,
}

impl TargetLocation {
    /// Create a target location; the name must not be blank
    pub fn new(name: impl AsRef<str>) -> Result<Self, LocationError> {
        let name = normalize(name.as_ref())?;
        let (tx, _rx) = watch::channel(Target { name, epoch: 0 });
        Ok(Self { tx: Arc::new(tx) })
    }

    /// Current name and epoch
    pub fn current(&self) -> Target {
        self.tx.borrow().clone()
    }

    pub fn name(&self) -> String {
        self.tx.borrow().name.clone()
    }

    pub fn epoch(&self) -> u64 {
        self.tx.borrow().epoch
    }

    /// Watch for changes
    pub fn subscribe(&self) -> watch::Receiver<Target> {
        self.tx.subscribe()
    }

    /// Swap in a new name and bump the epoch.
    ///
    /// Only the registry calls this, under its lock, so that the swap and the
    /// subscriber reset happen as one step.
    pub(crate) fn replace(&self, name: &str) -> Result<Target, LocationError> {
        let name = normalize(name)?;
        let mut updated = None;
        self.tx.send_modify(|target| {
            target.name = name;
            target.epoch += 1;
            updated = Some(target.clone());
        });
        Ok(updated.unwrap_or_else(|| self.current()))
    }
}

impl std::fmt::Debug for TargetLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let target = self.tx.borrow();
        f.debug_struct("TargetLocation")
            .field("name", &target.name)
            .field("epoch", &target.epoch)
            .finish()
    }
}

fn normalize(name: &str) -> Result<String, LocationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LocationError::Empty);
    }
    Ok(trimmed.to_string())
}

/// Errors for target location updates
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("City is required")]
    Empty,
}

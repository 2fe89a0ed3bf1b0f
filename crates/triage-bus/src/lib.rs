//! Triage Bus
//!
//! In-process publish/subscribe of document-change events.
//!
//! The bus is a bounded broadcast channel. Publishing never waits on
//! subscribers: a subscriber that falls more than `capacity` events behind
//! loses the oldest events and is told how many it missed. Every subscriber
//! sees events in the order they were published. There is no persistence and
//! no replay.
//!
//! # Example
//!
//! ```rust
//! use triage_bus::{ChangeBus, ChangeEvent, ChangeKind};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = ChangeBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ChangeEvent::new(vec!["tickets/1".into()], ChangeKind::Created));
//! let event = rx.recv().await.unwrap();
//! assert_eq!(event.kind, ChangeKind::Created);
//! # }
//! ```

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::RecvError;

/// Default number of events a subscriber may lag behind
pub const DEFAULT_CAPACITY: usize = 1024;

/// Kind of document change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Documents were inserted
    Created,
    /// Documents were modified
    Updated,
    /// Documents were removed
    Deleted,
}

/// Change notification covering one mutating operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Affected document ids (`<collection>/<key>`)
    pub ids: Vec<String>,
    /// What happened to them
    pub kind: ChangeKind,
}

impl ChangeEvent {
    /// Create event
    #[inline]
    #[must_use]
    pub fn new(ids: Vec<String>, kind: ChangeKind) -> Self {
        Self { ids, kind }
    }
}

/// Process-wide change bus
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    /// Create a bus whose subscribers may lag `capacity` events behind
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events published from now on
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// Publish an event; returns the number of subscribers it reached
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::debug!(kind = ?event.kind, ids = event.ids.len(), "publishing change event");
        // no subscribers is not an error
        self.tx.send(event).unwrap_or(0)
    }

    /// Number of live subscribers
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

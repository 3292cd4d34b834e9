//! Latest-snapshot cache.
//!
//! Holds the most recent aggregated result for late-joining subscribers.
//! Publishing replaces the snapshot; subscribers that have not caught up
//! only ever see the newest one.

use crate::models::AggregatedResult;
use std::sync::Arc;
use tokio::sync::watch;

/// Shared snapshot, `None` until the first successful aggregation.
pub type Snapshot = Option<Arc<AggregatedResult>>;

/// Latest-value cache with get/set/subscribe semantics.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    tx: Arc<watch::Sender<Snapshot>>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot.
    pub fn get(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Replace the snapshot and notify subscribers.
    pub fn set(&self, result: AggregatedResult) {
        self.tx.send_replace(Some(Arc::new(result)));
    }

    /// Receiver that observes every future replacement.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    /// Returns true once a snapshot has been published.
    pub fn has_data(&self) -> bool {
        self.tx.borrow().is_some()
    }
}

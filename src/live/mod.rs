//! Live dashboard feed.
//!
//! A file watcher re-aggregates the results file on change and a small
//! HTTP server pushes each snapshot to subscribers.

pub mod cache;
pub mod server;
pub mod watcher;

pub use cache::SnapshotCache;
pub use watcher::ResultsWatcher;

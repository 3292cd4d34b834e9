//! Results file watcher.
//!
//! Re-aggregates the whole results file whenever it changes and publishes
//! the new snapshot. Refreshes run one at a time; change notifications
//! that pile up while waiting or aggregating are collapsed into a single
//! follow-up refresh.

use super::cache::SnapshotCache;
use crate::analysis::{aggregate_str, AggregateOptions};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Result of a single refresh attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was published.
    Updated,
    /// The file is missing or empty; nothing was aggregated.
    AwaitingData,
}

/// Watches one results file and keeps a snapshot cache current.
#[derive(Debug, Clone)]
pub struct ResultsWatcher {
    path: PathBuf,
    options: AggregateOptions,
    debounce: Duration,
    cache: SnapshotCache,
}

impl ResultsWatcher {
    /// Create a watcher publishing into `cache`.
    pub fn new(
        path: PathBuf,
        options: AggregateOptions,
        debounce: Duration,
        cache: SnapshotCache,
    ) -> Self {
        Self {
            path,
            options,
            debounce,
            cache,
        }
    }

    /// Read and aggregate the file once.
    ///
    /// On error the cache keeps its previous snapshot.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(RefreshOutcome::AwaitingData);
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read results file: {}", self.path.display())
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(RefreshOutcome::AwaitingData);
        }

        let options = self.options;
        let result = tokio::task::spawn_blocking(move || aggregate_str(&content, options))
            .await
            .context("Aggregation task failed")?;

        info!(
            "Aggregated {} metrics from {}",
            result.metrics.len(),
            self.path.display()
        );
        self.cache.set(result);
        Ok(RefreshOutcome::Updated)
    }

    /// Watch the file until the notification channel closes.
    pub async fn run(self) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = tx.send(event);
            }
            Err(e) => warn!("File watch error: {}", e),
        })
        .context("Failed to create file watcher")?;

        let dir = watch_dir(&self.path);
        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch directory: {}", dir.display()))?;

        info!("Monitoring {} for changes", self.path.display());
        self.refresh_logged().await;

        while let Some(event) = rx.recv().await {
            if !self.concerns(&event) {
                continue;
            }

            tokio::time::sleep(self.debounce).await;
            let mut superseded = 0usize;
            while rx.try_recv().is_ok() {
                superseded += 1;
            }
            if superseded > 0 {
                debug!("Coalesced {} pending change notifications", superseded);
            }

            self.refresh_logged().await;
        }

        Ok(())
    }

    async fn refresh_logged(&self) {
        match self.refresh().await {
            Ok(RefreshOutcome::Updated) => {}
            Ok(RefreshOutcome::AwaitingData) => {
                info!("Awaiting data in {}", self.path.display());
            }
            Err(e) => error!("Refresh failed, keeping last snapshot: {:#}", e),
        }
    }

    /// Returns true if the event touches the watched file.
    fn concerns(&self, event: &Event) -> bool {
        if matches!(event.kind, EventKind::Access(_)) {
            return false;
        }
        let name = self.path.file_name();
        event.paths.iter().any(|p| p.file_name() == name)
    }
}

/// Directory to watch; the file itself may not exist yet.
fn watch_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, ModifyKind};

    const SAMPLE: &str = include_str!("../../fixtures/sample_results.ndjson");

    fn watcher_for(path: PathBuf, cache: &SnapshotCache) -> ResultsWatcher {
        ResultsWatcher::new(
            path,
            AggregateOptions::with_time_series(true),
            Duration::from_millis(10),
            cache.clone(),
        )
    }

    #[tokio::test]
    async fn test_refresh_missing_file_awaits_data() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SnapshotCache::new();
        let watcher = watcher_for(dir.path().join("results.json"), &cache);

        assert_eq!(watcher.refresh().await.unwrap(), RefreshOutcome::AwaitingData);
        assert!(!cache.has_data());
    }

    #[tokio::test]
    async fn test_refresh_empty_file_awaits_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "\n").unwrap();
        let cache = SnapshotCache::new();

        let outcome = watcher_for(path, &cache).refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::AwaitingData);
    }

    #[tokio::test]
    async fn test_refresh_publishes_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let cache = SnapshotCache::new();

        let outcome = watcher_for(path, &cache).refresh().await.unwrap();
        assert_eq!(outcome, RefreshOutcome::Updated);

        let snapshot = cache.get().unwrap();
        assert_eq!(snapshot.root_info.iteration_count, 2);
        let duration = snapshot.summary("http_req_duration").unwrap();
        assert!(duration.trend().unwrap().time_series.is_some());
    }

    #[tokio::test]
    async fn test_failed_read_keeps_last_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let cache = SnapshotCache::new();
        watcher_for(path.clone(), &cache).refresh().await.unwrap();

        std::fs::write(&path, b"\xff\xfe\xfd").unwrap();
        assert!(watcher_for(path, &cache).refresh().await.is_err());
        assert_eq!(cache.get().unwrap().root_info.iteration_count, 2);
    }

    #[test]
    fn test_concerns_filters_by_name_and_kind() {
        let cache = SnapshotCache::new();
        let watcher = watcher_for(PathBuf::from("/tmp/run/results.json"), &cache);

        let modify = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/tmp/run/results.json"));
        assert!(watcher.concerns(&modify));

        let other = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/tmp/run/other.json"));
        assert!(!watcher.concerns(&other));

        let access = Event::new(EventKind::Access(AccessKind::Any))
            .add_path(PathBuf::from("/tmp/run/results.json"));
        assert!(!watcher.concerns(&access));
    }

    #[test]
    fn test_watch_dir() {
        assert_eq!(watch_dir(Path::new("results.json")), PathBuf::from("."));
        assert_eq!(
            watch_dir(Path::new("/data/results.json")),
            PathBuf::from("/data")
        );
    }

    #[tokio::test]
    async fn test_run_picks_up_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let cache = SnapshotCache::new();
        let handle = tokio::spawn(watcher_for(path.clone(), &cache).run());

        let picked_up = tokio::time::timeout(Duration::from_secs(10), async {
            while !cache.has_data() {
                tokio::fs::write(&path, SAMPLE).await.unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

        handle.abort();
        assert!(picked_up.is_ok(), "watcher never published a snapshot");
    }
}

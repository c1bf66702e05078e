//! Retention sweep
//!
//! Walks the per-kind recording directories and deletes files whose
//! modification time is older than the retention window. Runs once at
//! startup, then on a fixed interval until shutdown. A stat or delete
//! failure skips that file and the sweep moves on.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::store::RecordingStore;

pub struct RetentionSweeper {
    store: Arc<RecordingStore>,
    retention: Duration,
    interval: Duration,
}

impl RetentionSweeper {
    pub fn new(store: Arc<RecordingStore>, retention: Duration, interval: Duration) -> Self {
        Self {
            store,
            retention,
            interval,
        }
    }

    /// Delete every stored recording older than the retention window
    pub async fn sweep(&self) {
        self.sweep_at(SystemTime::now()).await;
    }

    /// Sweep against an explicit clock; age is `now - mtime`
    pub async fn sweep_at(&self, now: SystemTime) {
        let mut removed = 0usize;
        let mut kept = 0usize;

        let mut kinds = match tokio::fs::read_dir(self.store.root()).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Retention sweep skipped, cannot read {}: {}", self.store.root().display(), e);
                return;
            }
        };

        while let Ok(Some(kind_dir)) = kinds.next_entry().await {
            let kind_path = kind_dir.path();
            if !kind_path.is_dir() {
                continue;
            }

            let mut files = match tokio::fs::read_dir(&kind_path).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Cannot read {}: {}", kind_path.display(), e);
                    continue;
                }
            };

            while let Ok(Some(entry)) = files.next_entry().await {
                let path = entry.path();
                let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                    Ok(modified) => modified,
                    Err(e) => {
                        warn!("Cannot stat {}: {}", path.display(), e);
                        continue;
                    }
                };

                let age = now
                    .duration_since(modified)
                    .unwrap_or(Duration::ZERO);
                if age > self.retention {
                    match tokio::fs::remove_file(&path).await {
                        Ok(()) => {
                            info!(age_secs = age.as_secs(), "Expired recording deleted: {}", path.display());
                            removed += 1;
                        }
                        Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
                    }
                } else {
                    kept += 1;
                }
            }
        }

        debug!(removed, kept, "retention sweep finished");
    }

    /// Run an immediate sweep, then one per interval until shutdown
    pub fn spawn(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        info!(
            retention_secs = self.retention.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Retention sweeper started"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.sweep().await,
                    _ = shutdown.recv() => {
                        info!("Retention sweeper stopped");
                        break;
                    }
                }
            }
        });
    }
}

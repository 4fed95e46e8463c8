//! Background TTL sweep
//!
//! One tokio task per index. The task ticks at a fixed interval and purges
//! expired entries from every registered cache until it is shut down.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::ttl::TtlCache;

/// Anything that can drop its expired entries.
pub trait Sweepable: Send + Sync {
    /// Purges expired entries, returning how many were removed
    fn sweep(&self) -> usize;
}

impl<K, V> Sweepable for TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn sweep(&self) -> usize {
        self.purge_expired()
    }
}

/// Handle to a running sweep task.
#[derive(Debug)]
pub struct CacheSweeper {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl CacheSweeper {
    /// Spawns the sweep task on the current tokio runtime.
    pub fn spawn(label: String, interval: Duration, caches: Vec<Arc<dyn Sweepable>>) -> Self {
        let (shutdown, mut stopped) = watch::channel(false);
        let period = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed: usize = caches.iter().map(|c| c.sweep()).sum();
                        if removed > 0 {
                            debug!(index_id = %label, removed, "cache sweep purged expired entries");
                        } else {
                            trace!(index_id = %label, "cache sweep found nothing to purge");
                        }
                    }
                    changed = stopped.changed() => {
                        if changed.is_err() || *stopped.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Stops the task and waits for it to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for CacheSweeper {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

//! Periodic eviction of expired cache entries.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use clipforge_media::CacheStore;

pub struct CacheSweeper;

impl CacheSweeper {
    /// Sweep immediately, then every `interval`, until `shutdown` flips to true.
    pub fn spawn(
        cache: Arc<CacheStore>,
        max_age: Duration,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Cache sweeper started (max age {}s, every {}s)",
                max_age.as_secs(),
                interval.as_secs()
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let evicted = cache.evict_older_than(max_age).await;
                        debug!("Cache sweep removed {} entries", evicted);
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("Cache sweeper stopped");
        })
    }
}

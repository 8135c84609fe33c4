//! Maintenance Task
//!
//! Background task that periodically expires near cache entries, enforces the
//! near cache capacity, and prunes stale access patterns.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheEngine;

/// Spawns the periodic maintenance loop.
///
/// Each tick runs `cleanup_expired_l1`, `manage_l1_size` and
/// `prune_access_patterns`. Abort the returned handle to stop it.
///
/// # Example
/// ```ignore
/// let engine = Arc::new(CacheEngine::new(config, store));
/// let maintenance = spawn_maintenance_task(engine.clone(), 30);
/// // Later, during shutdown:
/// maintenance.abort();
/// ```
pub fn spawn_maintenance_task(engine: Arc<CacheEngine>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting cache maintenance task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let expired = engine.cleanup_expired_l1();
            let evicted = engine.manage_l1_size();
            let pruned = engine.prune_access_patterns();

            if expired + evicted + pruned > 0 {
                info!(
                    expired,
                    evicted, pruned, "Cache maintenance: removed stale near entries and patterns"
                );
            } else {
                debug!("Cache maintenance: nothing to do");
            }
        }
    })
}

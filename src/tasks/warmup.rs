//! Warm-up Task
//!
//! Background task that periodically runs a full cache warm-up.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::cache::CacheEngine;

/// Spawns the periodic warm-up loop. The first run happens immediately.
pub fn spawn_warmup_task(engine: Arc<CacheEngine>, interval_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!("Starting cache warm-up task with interval of {} seconds", period.as_secs());

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            engine.warmup_cache(true).await;
        }
    })
}

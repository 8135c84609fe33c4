//! Cache warm-up: fixed baseline keys, dashboard pre-population, and
//! re-population of hot keys from access patterns.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::CacheEngine;
use crate::cache::entry::current_timestamp_ms;
use crate::error::Result;

/// Fallback value source for hot keys the near cache no longer holds.
#[async_trait]
pub trait WarmupSource: Send + Sync {
    /// Authoritative value for `key`, or `None` if the source has nothing for it.
    async fn fetch(&self, key: &str) -> Result<Option<Value>>;
}

/// Counts of warm-up writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WarmupReport {
    pub written: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl WarmupReport {
    fn record(&mut self, ok: bool) {
        if ok {
            self.written += 1;
        } else {
            self.failed += 1;
        }
    }

    fn merge(&mut self, other: WarmupReport) {
        self.written += other.written;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

const HEALTH_KEY: &str = "system:health";
const HEALTH_TTL: u64 = 60;
const APP_CONFIG_KEY: &str = "config:app";
const APP_CONFIG_TTL: u64 = 300;

const DASHBOARD_TTL: u64 = 600;
const DASHBOARD_WIDGETS_TTL: u64 = 300;
const DASHBOARD_METADATA_TTL: u64 = 900;

impl CacheEngine {
    /// Writes a dashboard and its widgets and metadata slices to the far cache,
    /// and seeds the near cache with the full object.
    ///
    /// Each slice is written independently; one failure does not stop the others.
    pub async fn warm_dashboard_cache(&self, id: &str, data: &Value) -> WarmupReport {
        let widgets = data.get("widgets").cloned().unwrap_or_else(|| json!([]));
        let metadata = json!({
            "id": data.get("id").cloned().unwrap_or_else(|| json!(id)),
            "title": data.get("title").cloned().unwrap_or(Value::Null),
            "widgetCount": widgets.as_array().map_or(0, |w| w.len()),
        });

        let dashboard_key = format!("dashboard:{}", id);
        let widgets_key = format!("dashboard:{}:widgets", id);
        let metadata_key = format!("dashboard:{}:metadata", id);

        let (full, widgets_ok, metadata_ok) = tokio::join!(
            self.warm_write(&dashboard_key, DASHBOARD_TTL, data),
            self.warm_write(&widgets_key, DASHBOARD_WIDGETS_TTL, &widgets),
            self.warm_write(&metadata_key, DASHBOARD_METADATA_TTL, &metadata),
        );

        let mut report = WarmupReport::default();
        for ok in [full, widgets_ok, metadata_ok] {
            report.record(ok);
        }

        self.fill_near(&dashboard_key, data.clone(), self.config.default_l1_ttl);
        debug!(dashboard = %id, written = report.written, failed = report.failed, "dashboard cache warmed");
        report
    }

    /// Warms the baseline keys and, when `full`, the hot keys as well.
    pub async fn warmup_cache(&self, full: bool) -> WarmupReport {
        let mut report = WarmupReport::default();

        let health = json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "near_entries": self.near.len(),
        });
        report.record(self.warm_write(HEALTH_KEY, HEALTH_TTL, &health).await);

        match serde_json::to_value(&self.config) {
            Ok(config) => {
                let app_config = json!({
                    "config": config,
                    "strategies": self.strategies.names(),
                });
                report.record(self.warm_write(APP_CONFIG_KEY, APP_CONFIG_TTL, &app_config).await);
            }
            Err(e) => {
                warn!(error = %e, "configuration snapshot could not be encoded");
                report.record(false);
            }
        }

        if full {
            report.merge(self.intelligent_warmup().await);
        }

        info!(
            full,
            written = report.written,
            failed = report.failed,
            skipped = report.skipped,
            "cache warm-up finished"
        );
        report
    }

    /// Re-populates the far cache for keys that are both frequently and
    /// recently accessed.
    ///
    /// Values come from the near cache, else from the registered
    /// [`WarmupSource`]; keys with neither are skipped.
    pub async fn intelligent_warmup(&self) -> WarmupReport {
        let warmup = &self.config.warmup;
        let hot = self.access.hot_keys(
            warmup.min_count,
            warmup.recency_window.saturating_mul(1000),
            current_timestamp_ms(),
        );

        let mut report = WarmupReport::default();
        for (key, pattern) in hot {
            let value = match self.near.peek(&key) {
                Some(value) => value,
                None => match self.fetch_from_source(&key).await {
                    Ok(Some(value)) => value,
                    Ok(None) => {
                        debug!(key = %key, count = pattern.count, "no value available to warm");
                        report.skipped += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "warm-up source failed");
                        report.record(false);
                        self.metrics.record_warmup_write(false);
                        continue;
                    }
                },
            };

            let ttl = self
                .strategies
                .for_warm_key(&key)
                .map_or(warmup.default_ttl, |s| s.l2_ttl_seconds);
            report.record(self.warm_write(&key, ttl, &value).await);
        }
        report
    }

    async fn fetch_from_source(&self, key: &str) -> Result<Option<Value>> {
        match &self.warmup_source {
            Some(source) => source.fetch(key).await,
            None => Ok(None),
        }
    }

    async fn warm_write(&self, key: &str, ttl_seconds: u64, value: &Value) -> bool {
        let ok = match self.far.set_json(key, ttl_seconds, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "warm-up write failed");
                false
            }
        };
        self.metrics.record_warmup_write(ok);
        ok
    }
}

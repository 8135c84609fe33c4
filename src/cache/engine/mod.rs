//! Cache Engine
//!
//! Composes the near cache and the far cache behind one read-through call.
//! Lookups go near, then far, then the caller's loader, back-filling every
//! layer that was skipped. Far cache failures are logged and absorbed; only the
//! loader's own error ever reaches the caller.

mod health;
mod invalidation;
mod warmup;

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::access::AccessPatternTracker;
use crate::cache::entry::current_timestamp_ms;
use crate::cache::far::{parse_server_info, FarCache};
use crate::cache::near::{NearCache, NearLookup};
use crate::cache::stats::{
    CacheStatsSnapshot, FarCacheStats, Metrics, NearCacheStats, PerformanceStats, RequestOutcome,
    StrategyAnalyticsReport,
};
use crate::cache::strategy::StrategyTable;
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::store::FarStore;

pub use health::{HealthReport, HealthStatus};
pub use invalidation::{InvalidationRecord, InvalidationReport};
pub use warmup::{WarmupReport, WarmupSource};

/// Per-call TTLs and an optional strategy name that overrides them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOptions {
    pub l1_ttl_seconds: u64,
    pub l2_ttl_seconds: u64,
    pub strategy: Option<String>,
}

impl Default for GetOptions {
    fn default() -> Self {
        Self {
            l1_ttl_seconds: 60,
            l2_ttl_seconds: 300,
            strategy: None,
        }
    }
}

impl GetOptions {
    pub fn new(l1_ttl_seconds: u64, l2_ttl_seconds: u64) -> Self {
        Self {
            l1_ttl_seconds,
            l2_ttl_seconds,
            strategy: None,
        }
    }

    /// Default TTLs with a named strategy.
    pub fn with_strategy(name: &str) -> Self {
        Self::default().strategy(name)
    }

    pub fn strategy(mut self, name: &str) -> Self {
        self.strategy = Some(name.to_string());
        self
    }
}

/// Removes the in-flight slot for `key` once its owner is done, unless a
/// newer slot already replaced it.
struct InFlightGuard<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    key: &'a str,
    slot: &'a Arc<Mutex<()>>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.map.remove_if(self.key, |_, slot| Arc::ptr_eq(slot, self.slot));
    }
}

// == Cache Engine ==
pub struct CacheEngine {
    config: Config,
    near: NearCache,
    far: FarCache,
    strategies: StrategyTable,
    access: Arc<AccessPatternTracker>,
    metrics: Metrics,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
    audit_log: parking_lot::Mutex<VecDeque<InvalidationRecord>>,
    warmup_source: Option<Arc<dyn WarmupSource>>,
}

impl CacheEngine {
    // == Constructors ==
    /// Creates an engine with the built-in strategy table.
    pub fn new(config: Config, store: Arc<dyn FarStore>) -> Self {
        Self::with_strategies(config, store, StrategyTable::default())
    }

    pub fn with_strategies(config: Config, store: Arc<dyn FarStore>, strategies: StrategyTable) -> Self {
        let access = Arc::new(AccessPatternTracker::new());
        let near = NearCache::new(config.max_l1_entries, config.eviction_policy, access.clone());
        let far = FarCache::new(store, config.far_timeout());

        Self {
            config,
            near,
            far,
            strategies,
            access,
            metrics: Metrics::new(),
            in_flight: DashMap::new(),
            audit_log: parking_lot::Mutex::new(VecDeque::new()),
            warmup_source: None,
        }
    }

    /// Creates an engine, loading the strategy table from
    /// `config.strategies_file` when one is set.
    pub fn from_config(config: Config, store: Arc<dyn FarStore>) -> Result<Self> {
        let strategies = match &config.strategies_file {
            Some(path) => StrategyTable::from_json_file(path)?,
            None => StrategyTable::default(),
        };
        Ok(Self::with_strategies(config, store, strategies))
    }

    /// Registers the source intelligent warm-up falls back to for keys the
    /// near cache no longer holds.
    pub fn with_warmup_source(mut self, source: Arc<dyn WarmupSource>) -> Self {
        self.warmup_source = Some(source);
        self
    }

    // == Read-through ==
    /// Returns the value for `key`, consulting the near cache, then the far
    /// cache, then `loader`.
    ///
    /// The loader runs only on a full miss. Its error is returned unchanged and
    /// nothing is cached for it. Dropping the returned future drops the loader
    /// and writes nothing.
    pub async fn get_or_load<T, E, F, Fut>(
        &self,
        key: &str,
        options: GetOptions,
        loader: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let started = Instant::now();
        let (l1_ttl, l2_ttl, strategy) = self.resolve_ttls(&options);

        if let Some(value) = self.lookup_near(key) {
            self.metrics
                .record_request(strategy, RequestOutcome::NearHit, started.elapsed());
            return Ok(value);
        }

        if !self.config.coalesce_loads {
            return self
                .load_through(key, l1_ttl, l2_ttl, strategy, started, loader)
                .await;
        }

        let slot = self
            .in_flight
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _held = slot.lock().await;
        let _cleanup = InFlightGuard {
            map: &self.in_flight,
            key,
            slot: &slot,
        };

        // Whoever held the slot before us may have filled the cache
        if let Some(value) = self.lookup_near(key) {
            self.metrics
                .record_request(strategy, RequestOutcome::NearHit, started.elapsed());
            return Ok(value);
        }
        self.load_through(key, l1_ttl, l2_ttl, strategy, started, loader)
            .await
    }

    async fn load_through<T, E, F, Fut>(
        &self,
        key: &str,
        l1_ttl: u64,
        l2_ttl: u64,
        strategy: Option<&str>,
        started: Instant,
        loader: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        match self.far.get_json(key).await {
            Ok(Some(value)) => match serde_json::from_value::<T>(value.clone()) {
                Ok(typed) => {
                    debug!(key = %key, "far cache hit");
                    self.fill_near(key, value, l1_ttl);
                    self.metrics
                        .record_request(strategy, RequestOutcome::FarHit, started.elapsed());
                    return Ok(typed);
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "far cache value has an unexpected shape, reloading");
                    self.metrics.record_deserialization_error();
                }
            },
            Ok(None) => {}
            Err(e @ CacheError::Deserialization(_)) => {
                warn!(key = %key, error = %e, "far cache value is corrupt, reloading");
                self.metrics.record_deserialization_error();
            }
            Err(e) => {
                warn!(key = %key, error = %e, "far cache read failed, falling through to loader");
                self.metrics.record_far_error();
            }
        }

        let loaded = loader().await;
        self.metrics
            .record_request(strategy, RequestOutcome::Miss, started.elapsed());
        let value = match loaded {
            Ok(value) => value,
            Err(e) => {
                self.metrics.record_loader_error();
                return Err(e);
            }
        };

        match serde_json::to_value(&value) {
            Ok(json) => {
                self.fill_near(key, json.clone(), l1_ttl);
                if let Err(e) = self.far.set_json(key, l2_ttl, &json).await {
                    warn!(key = %key, error = %e, "far cache write failed");
                    self.metrics.record_far_error();
                }
            }
            Err(e) => {
                warn!(key = %key, error = %e, "loaded value could not be serialized, returning it uncached");
            }
        }
        Ok(value)
    }

    /// Near cache read that records the access. A value that does not decode
    /// into `T` is reported as a miss.
    fn lookup_near<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.near.get(key) {
            NearLookup::Hit(value) => match serde_json::from_value(value) {
                Ok(typed) => {
                    self.access.record_access(key);
                    Some(typed)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "near cache value has an unexpected shape");
                    self.metrics.record_deserialization_error();
                    None
                }
            },
            NearLookup::Expired => {
                self.metrics.record_expired(1);
                None
            }
            NearLookup::Miss => None,
        }
    }

    fn fill_near(&self, key: &str, value: Value, ttl_seconds: u64) {
        let evicted = self.near.insert(key, value, ttl_seconds);
        self.metrics.record_evictions(evicted);
    }

    /// Strategy TTLs win over the caller's; unknown names keep the caller's
    /// and are not tracked as a strategy.
    fn resolve_ttls(&self, options: &GetOptions) -> (u64, u64, Option<&str>) {
        match options.strategy.as_deref() {
            Some(name) => match self.strategies.get(name) {
                Some(strategy) => (
                    strategy.l1_ttl_seconds,
                    strategy.l2_ttl_seconds,
                    Some(strategy.name.as_str()),
                ),
                None => {
                    debug!(strategy = %name, "unknown cache strategy, using caller TTLs");
                    (options.l1_ttl_seconds, options.l2_ttl_seconds, None)
                }
            },
            None => (options.l1_ttl_seconds, options.l2_ttl_seconds, None),
        }
    }

    // == Batch read ==
    /// Reads many keys from the far cache in one call.
    ///
    /// Missing or undecodable entries map to `None`. If the bulk read fails,
    /// every key is read on its own, near cache first. Nothing is back-filled
    /// and no loader runs.
    pub async fn batch_get(&self, keys: &[String]) -> HashMap<String, Option<Value>> {
        if keys.is_empty() {
            return HashMap::new();
        }

        match self.far.get_json_many(keys).await {
            Ok(values) => return keys.iter().cloned().zip(values).collect(),
            Err(e) => {
                warn!(key_count = keys.len(), error = %e, "batch get failed, reading keys one by one");
                self.metrics.record_far_error();
            }
        }

        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            let value = match self.lookup_near::<Value>(key) {
                Some(value) => Some(value),
                None => match self.far.get_json(key).await {
                    Ok(value) => value,
                    Err(e) => {
                        debug!(key = %key, error = %e, "batch fallback read failed");
                        None
                    }
                },
            };
            results.insert(key.clone(), value);
        }
        results
    }

    // == Stats ==
    /// Combined near, far and performance report. Never fails; an unreachable
    /// or unparseable far cache reports zero defaults.
    pub async fn get_cache_stats(&self) -> CacheStatsSnapshot {
        let snapshot = self.metrics.snapshot();
        let hit_rate = snapshot.hit_rate();
        let miss_rate = if snapshot.hits + snapshot.misses == 0 {
            0.0
        } else {
            100.0 - hit_rate
        };

        let l2_cache = match self.far.server_stats().await {
            Ok(text) => parse_server_info(&text),
            Err(e) => {
                warn!(error = %e, "far cache stats unavailable");
                self.metrics.record_far_error();
                FarCacheStats::default()
            }
        };

        CacheStatsSnapshot {
            l1_cache: NearCacheStats {
                size: self.near.len(),
                memory_usage: self.near.approximate_memory_bytes(),
                hit_rate,
                miss_rate,
            },
            l2_cache,
            performance: PerformanceStats {
                total_hits: snapshot.hits,
                total_misses: snapshot.misses,
                hit_rate,
                avg_response_time: snapshot.avg_response_time_ms,
            },
        }
    }

    pub fn strategy_analytics(&self) -> StrategyAnalyticsReport {
        self.metrics.strategy_analytics(&self.strategies.names())
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    // == Maintenance ==
    /// Drops every expired near cache entry. Returns how many were removed.
    pub fn cleanup_expired_l1(&self) -> usize {
        let removed = self.near.cleanup_expired();
        self.metrics.record_expired(removed);
        removed
    }

    /// Evicts near cache entries until the table is within capacity.
    pub fn manage_l1_size(&self) -> usize {
        let evicted = self.near.enforce_capacity();
        self.metrics.record_evictions(evicted);
        evicted
    }

    /// Forgets access patterns idle for longer than the configured retention.
    pub fn prune_access_patterns(&self) -> usize {
        let retention_ms = self.config.access_retention.saturating_mul(1000);
        self.access
            .prune_older_than(current_timestamp_ms().saturating_sub(retention_ms))
    }

    // == Accessors ==
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Options carrying the configured default TTLs.
    pub fn default_options(&self) -> GetOptions {
        GetOptions::new(self.config.default_l1_ttl, self.config.default_l2_ttl)
    }

    pub fn near(&self) -> &NearCache {
        &self.near
    }

    pub fn far(&self) -> &FarCache {
        &self.far
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    pub fn access_patterns(&self) -> &AccessPatternTracker {
        &self.access
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Number of keys with a load currently holding the single-flight slot.
    pub fn in_flight_loads(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryFarStore;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn engine_with(config: Config) -> (CacheEngine, Arc<InMemoryFarStore>) {
        let store = Arc::new(InMemoryFarStore::new());
        (CacheEngine::new(config, store.clone()), store)
    }

    fn engine() -> (CacheEngine, Arc<InMemoryFarStore>) {
        engine_with(Config::default())
    }

    #[tokio::test]
    async fn test_loader_runs_once_then_near_hit() {
        let (engine, store) = engine();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Value = engine
                .get_or_load("test:key:123", GetOptions::default(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(json!({"id": "123", "name": "Test Data"}))
                })
                .await
                .unwrap();
            assert_eq!(value["name"], "Test Data");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.ttl_of("test:key:123"), Some(300));
        let entry = engine.near().entry("test:key:123").unwrap();
        let remaining = entry.ttl_remaining();
        assert!((58..=60).contains(&remaining));

        let snapshot = engine.metrics().snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.l1_hits, 2);
    }

    #[tokio::test]
    async fn test_typed_values() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Profile {
            id: u32,
            name: String,
        }

        let (engine, _store) = engine();
        let loaded: Profile = engine
            .get_or_load("user:1:profile", GetOptions::default(), || async {
                Ok::<_, String>(Profile { id: 1, name: "Ada".into() })
            })
            .await
            .unwrap();
        let cached: Profile = engine
            .get_or_load("user:1:profile", GetOptions::default(), || async {
                Err::<Profile, _>("must not load".to_string())
            })
            .await
            .unwrap();

        assert_eq!(loaded, cached);
    }

    #[tokio::test]
    async fn test_near_value_of_wrong_shape_is_a_miss() {
        let (engine, _store) = engine();
        engine.near().insert("k", json!("not a number"), 60);

        let value: u64 = engine
            .get_or_load("k", GetOptions::default(), || async { Ok::<_, String>(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(engine.near().peek("k"), Some(json!(7)));
        assert_eq!(engine.metrics().snapshot().deserialization_errors, 1);
    }

    #[tokio::test]
    async fn test_unknown_strategy_keeps_caller_ttls() {
        let (engine, store) = engine();
        let _: Value = engine
            .get_or_load("k", GetOptions::new(10, 42).strategy("nope"), || async {
                Ok::<_, String>(json!(1))
            })
            .await
            .unwrap();

        assert_eq!(store.ttl_of("k"), Some(42));
    }

    #[tokio::test]
    async fn test_only_configured_strategies_are_tracked() {
        let (engine, _store) = engine();
        for name in ["user-profile", "nope", "made-up"] {
            let _: Value = engine
                .get_or_load(name, GetOptions::with_strategy(name), || async {
                    Ok::<_, String>(json!(1))
                })
                .await
                .unwrap();
        }

        assert_eq!(engine.metrics().tracked_strategies(), vec!["user-profile".to_string()]);
        assert_eq!(engine.metrics().snapshot().misses, 3);
    }

    #[tokio::test]
    async fn test_batch_get_in_one_round_trip() {
        let (engine, store) = engine();
        store.set("a", 60, br#"{"n":1}"#.to_vec()).await.unwrap();
        store.set("b", 60, b"not json".to_vec()).await.unwrap();
        let keys: Vec<String> = ["a", "b", "c"].iter().map(|k| k.to_string()).collect();

        let results = engine.batch_get(&keys).await;

        assert_eq!(results.len(), 3);
        assert_eq!(results["a"], Some(json!({"n": 1})));
        assert_eq!(results["b"], None);
        assert_eq!(results["c"], None);
        assert_eq!(store.op_counts().0, 1);
        assert!(engine.near().is_empty());
        assert!(engine.batch_get(&[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_get_with_far_cache_down_uses_near_cache() {
        let (engine, store) = engine();
        engine.near().insert("a", json!("near"), 60);
        store.set_offline(true);
        let keys = vec!["a".to_string(), "b".to_string()];

        let results = engine.batch_get(&keys).await;

        assert_eq!(results["a"], Some(json!("near")));
        assert_eq!(results["b"], None);
        assert_eq!(engine.metrics().snapshot().far_errors, 1);
    }

    #[tokio::test]
    async fn test_offline_far_cache_degrades_to_loader() {
        let (engine, store) = engine();
        store.set_offline(true);

        let value: Value = engine
            .get_or_load("k", GetOptions::default(), || async { Ok::<_, String>(json!("fresh")) })
            .await
            .unwrap();

        assert_eq!(value, json!("fresh"));
        assert_eq!(engine.near().peek("k"), Some(json!("fresh")));
        // Read and write both failed
        assert_eq!(engine.metrics().snapshot().far_errors, 2);
    }

    #[tokio::test]
    async fn test_dropped_call_caches_nothing() {
        let (engine, store) = engine();

        let slow = engine.get_or_load("slow", GetOptions::default(), || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, String>(json!("late"))
        });
        let result = tokio::time::timeout(Duration::from_millis(20), slow).await;

        assert!(result.is_err());
        assert!(!engine.near().contains_key("slow"));
        assert!(store.raw("slow").is_none());
    }

    #[tokio::test]
    async fn test_coalesced_loads_run_loader_once() {
        let config = Config {
            coalesce_loads: true,
            ..Config::default()
        };
        let (engine, _store) = engine_with(config);
        let engine = Arc::new(engine);
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let engine = engine.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    engine
                        .get_or_load("cold", GetOptions::default(), || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            Ok::<_, String>(json!("v"))
                        })
                        .await
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), json!("v"));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.in_flight_loads(), 0);
    }

    /// Drives `misses` cold loads, then `hits` near cache hits.
    async fn drive_traffic(engine: &CacheEngine, hits: usize, misses: usize) {
        for i in 0..misses {
            let _: Value = engine
                .get_or_load(&format!("traffic:{}", i), GetOptions::default(), || async {
                    Ok::<_, String>(json!(i))
                })
                .await
                .unwrap();
        }
        for _ in 0..hits {
            let _: Value = engine
                .get_or_load("traffic:0", GetOptions::default(), || async {
                    Err::<Value, _>("must not load".to_string())
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let (engine, _store) = engine();
        drive_traffic(&engine, 80, 20).await;
        engine.near().clear();
        engine.near().insert("k", json!({"title": "Test Dashboard"}), 60);

        let stats = engine.get_cache_stats().await;
        assert_eq!(stats.l1_cache.size, 1);
        assert!(stats.l1_cache.memory_usage > 0);
        assert_eq!(stats.l1_cache.hit_rate, 80.0);
        assert_eq!(stats.l1_cache.miss_rate, 20.0);
        assert_eq!(stats.performance.hit_rate, 80.0);
        assert_eq!(stats.l2_cache.connected_clients, 1);
    }

    #[tokio::test]
    async fn test_stats_with_far_cache_down() {
        let (engine, store) = engine();
        store.set_offline(true);

        let stats = engine.get_cache_stats().await;
        assert_eq!(stats.l2_cache, FarCacheStats::default());
        assert_eq!(stats.l1_cache.miss_rate, 0.0);
    }

    #[tokio::test]
    async fn test_maintenance_operations() {
        let config = Config {
            max_l1_entries: 2,
            ..Config::default()
        };
        let (engine, _store) = engine_with(config);
        engine.near().insert("expired", json!(1), 0);
        engine.near().insert("live", json!(2), 60);

        assert_eq!(engine.cleanup_expired_l1(), 1);
        assert_eq!(engine.manage_l1_size(), 0);
        assert_eq!(engine.metrics().snapshot().expired_removed, 1);

        engine.access_patterns().record_access_at("ancient", 0);
        engine.access_patterns().record_access("recent");
        assert_eq!(engine.prune_access_patterns(), 1);
    }

    #[test]
    fn test_get_options() {
        let options = GetOptions::with_strategy("user-profile");
        assert_eq!(options.l1_ttl_seconds, 60);
        assert_eq!(options.l2_ttl_seconds, 300);
        assert_eq!(options.strategy.as_deref(), Some("user-profile"));
    }
}

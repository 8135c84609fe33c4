//! Cache Statistics Module
//!
//! Process-wide hit/miss counters, per-strategy analytics, and the snapshot
//! types returned by the stats report.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Where a read-through request was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    NearHit,
    FarHit,
    /// The loader was invoked
    Miss,
}

#[derive(Debug, Default, Clone, Copy)]
struct StrategyCounters {
    hits: u64,
    misses: u64,
    response_time_us: u64,
}

// == Metrics ==
/// Monotonic counters shared by every request path. Reset only by [`Metrics::reset`].
#[derive(Debug, Default)]
pub struct Metrics {
    hits: AtomicU64,
    misses: AtomicU64,
    total_requests: AtomicU64,
    l1_hits: AtomicU64,
    l2_hits: AtomicU64,
    loader_errors: AtomicU64,
    far_errors: AtomicU64,
    deserialization_errors: AtomicU64,
    evictions: AtomicU64,
    expired_removed: AtomicU64,
    invalidations: AtomicU64,
    warmup_writes: AtomicU64,
    warmup_failures: AtomicU64,
    response_time_us: AtomicU64,
    per_strategy: DashMap<String, StrategyCounters>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed read-through request.
    ///
    /// `strategy` must already be a configured name; callers drop unknown ones.
    pub fn record_request(&self, strategy: Option<&str>, outcome: RequestOutcome, elapsed: Duration) {
        let elapsed_us = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.response_time_us.fetch_add(elapsed_us, Ordering::Relaxed);

        match outcome {
            RequestOutcome::NearHit => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.l1_hits.fetch_add(1, Ordering::Relaxed);
            }
            RequestOutcome::FarHit => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                self.l2_hits.fetch_add(1, Ordering::Relaxed);
            }
            RequestOutcome::Miss => {
                self.misses.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Some(name) = strategy {
            let mut counters = self.per_strategy.entry(name.to_string()).or_default();
            match outcome {
                RequestOutcome::Miss => counters.misses += 1,
                RequestOutcome::NearHit | RequestOutcome::FarHit => counters.hits += 1,
            }
            counters.response_time_us = counters.response_time_us.saturating_add(elapsed_us);
        }
    }

    pub fn record_loader_error(&self) {
        self.loader_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_far_error(&self) {
        self.far_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deserialization_error(&self) {
        self.deserialization_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: usize) {
        if count > 0 {
            self.evictions.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_expired(&self, count: usize) {
        if count > 0 {
            self.expired_removed.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_warmup_write(&self, ok: bool) {
        if ok {
            self.warmup_writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.warmup_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Administrative reset of every counter.
    pub fn reset(&self) {
        for counter in [
            &self.hits,
            &self.misses,
            &self.total_requests,
            &self.l1_hits,
            &self.l2_hits,
            &self.loader_errors,
            &self.far_errors,
            &self.deserialization_errors,
            &self.evictions,
            &self.expired_removed,
            &self.invalidations,
            &self.warmup_writes,
            &self.warmup_failures,
            &self.response_time_us,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.per_strategy.clear();
    }

    /// Strategy names with counters, sorted.
    #[cfg(test)]
    pub(crate) fn tracked_strategies(&self) -> Vec<String> {
        let mut names: Vec<String> = self.per_strategy.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let response_time_us = self.response_time_us.load(Ordering::Relaxed);

        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            total_requests,
            l1_hits: self.l1_hits.load(Ordering::Relaxed),
            l2_hits: self.l2_hits.load(Ordering::Relaxed),
            loader_errors: self.loader_errors.load(Ordering::Relaxed),
            far_errors: self.far_errors.load(Ordering::Relaxed),
            deserialization_errors: self.deserialization_errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_removed: self.expired_removed.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            warmup_writes: self.warmup_writes.load(Ordering::Relaxed),
            warmup_failures: self.warmup_failures.load(Ordering::Relaxed),
            avg_response_time_ms: average_ms(response_time_us, total_requests),
        }
    }

    /// Per-strategy performance, in the order of `names`, plus overall recommendations.
    pub fn strategy_analytics(&self, names: &[String]) -> StrategyAnalyticsReport {
        let strategies: Vec<StrategyAnalytics> = names
            .iter()
            .map(|name| {
                let counters = self.per_strategy.get(name).map(|c| *c).unwrap_or_default();
                let requests = counters.hits + counters.misses;
                let hit_rate = percentage(counters.hits, requests);
                StrategyAnalytics {
                    name: name.clone(),
                    hits: counters.hits,
                    misses: counters.misses,
                    hit_rate,
                    avg_response_time: average_ms(counters.response_time_us, requests),
                    efficiency: efficiency_label(hit_rate).to_string(),
                }
            })
            .collect();

        let recommendations = strategies
            .iter()
            .filter(|s| s.hits + s.misses > 0)
            .flat_map(|s| {
                let mut tips = Vec::new();
                if s.hit_rate < 50.0 {
                    tips.push(format!(
                        "Low hit rate for {} strategy - consider increasing TTL",
                        s.name
                    ));
                }
                if s.avg_response_time > 100.0 {
                    tips.push(format!(
                        "High response time for {} - consider cache warming",
                        s.name
                    ));
                }
                tips
            })
            .collect();

        let snapshot = self.snapshot();
        StrategyAnalyticsReport {
            strategies,
            total_hits: snapshot.hits,
            total_misses: snapshot.misses,
            overall_hit_rate: snapshot.hit_rate(),
            recommendations,
        }
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub l1_hits: u64,
    pub l2_hits: u64,
    pub loader_errors: u64,
    pub far_errors: u64,
    pub deserialization_errors: u64,
    pub evictions: u64,
    pub expired_removed: u64,
    pub invalidations: u64,
    pub warmup_writes: u64,
    pub warmup_failures: u64,
    pub avg_response_time_ms: f64,
}

impl MetricsSnapshot {
    /// hits / (hits + misses) as a percentage, 0 when idle.
    pub fn hit_rate(&self) -> f64 {
        percentage(self.hits, self.hits + self.misses)
    }

    /// Share of all requests answered by the near cache, as a percentage.
    pub fn near_hit_rate(&self) -> f64 {
        percentage(self.l1_hits, self.total_requests)
    }
}

// == Stats Snapshot ==
/// Combined near/far/performance report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    pub l1_cache: NearCacheStats,
    pub l2_cache: FarCacheStats,
    pub performance: PerformanceStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearCacheStats {
    pub size: usize,
    /// Approximate bytes
    pub memory_usage: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
}

/// Far cache state parsed from the server's status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FarCacheStats {
    pub memory_usage: u64,
    pub memory_usage_human: String,
    pub connected_clients: u64,
}

impl Default for FarCacheStats {
    fn default() -> Self {
        Self {
            memory_usage: 0,
            memory_usage_human: "0B".to_string(),
            connected_clients: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceStats {
    pub total_hits: u64,
    pub total_misses: u64,
    pub hit_rate: f64,
    /// Milliseconds
    pub avg_response_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAnalytics {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    /// Milliseconds
    pub avg_response_time: f64,
    pub efficiency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAnalyticsReport {
    pub strategies: Vec<StrategyAnalytics>,
    pub total_hits: u64,
    pub total_misses: u64,
    pub overall_hit_rate: f64,
    pub recommendations: Vec<String>,
}

fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn average_ms(total_us: u64, samples: u64) -> f64 {
    if samples == 0 {
        0.0
    } else {
        total_us as f64 / samples as f64 / 1000.0
    }
}

fn efficiency_label(hit_rate: f64) -> &'static str {
    if hit_rate > 80.0 {
        "excellent"
    } else if hit_rate > 60.0 {
        "good"
    } else {
        "needs improvement"
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_metrics_new() {
        let snapshot = Metrics::new().snapshot();
        assert_eq!(snapshot, MetricsSnapshot::default());
        assert_eq!(snapshot.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_is_a_percentage() {
        let metrics = Metrics::new();
        for _ in 0..80 {
            metrics.record_request(None, RequestOutcome::FarHit, MS);
        }
        for _ in 0..20 {
            metrics.record_request(None, RequestOutcome::Miss, MS);
        }
        assert_eq!(metrics.snapshot().hit_rate(), 80.0);
    }

    #[test]
    fn test_record_request_outcomes() {
        let metrics = Metrics::new();
        metrics.record_request(None, RequestOutcome::NearHit, MS);
        metrics.record_request(None, RequestOutcome::FarHit, MS);
        metrics.record_request(None, RequestOutcome::Miss, 4 * MS);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.misses, 1);
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.l1_hits, 1);
        assert_eq!(snapshot.l2_hits, 1);
        assert!((snapshot.avg_response_time_ms - 2.0).abs() < 1e-9);
        assert!((snapshot.near_hit_rate() - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let metrics = Metrics::new();
        metrics.record_request(Some("user-profile"), RequestOutcome::Miss, MS);
        metrics.record_far_error();
        metrics.record_evictions(3);
        metrics.reset();

        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
        let report = metrics.strategy_analytics(&["user-profile".to_string()]);
        assert_eq!(report.strategies[0].hits + report.strategies[0].misses, 0);
    }

    #[test]
    fn test_strategy_analytics_and_recommendations() {
        let metrics = Metrics::new();
        for _ in 0..9 {
            metrics.record_request(Some("user-profile"), RequestOutcome::NearHit, MS);
        }
        metrics.record_request(Some("user-profile"), RequestOutcome::Miss, MS);
        metrics.record_request(Some("search-results"), RequestOutcome::Miss, 150 * MS);

        let names = vec![
            "search-results".to_string(),
            "user-profile".to_string(),
            "unused".to_string(),
        ];
        let report = metrics.strategy_analytics(&names);

        let user = &report.strategies[1];
        assert_eq!(user.hit_rate, 90.0);
        assert_eq!(user.efficiency, "excellent");

        let search = &report.strategies[0];
        assert_eq!(search.efficiency, "needs improvement");
        assert_eq!(
            report.recommendations,
            vec![
                "Low hit rate for search-results strategy - consider increasing TTL".to_string(),
                "High response time for search-results - consider cache warming".to_string(),
            ]
        );
        assert_eq!(report.total_hits, 9);
        assert_eq!(report.total_misses, 2);
    }

    #[test]
    fn test_far_stats_default_is_zeroed() {
        let stats = FarCacheStats::default();
        assert_eq!(stats.memory_usage, 0);
        assert_eq!(stats.memory_usage_human, "0B");
        assert_eq!(stats.connected_clients, 0);
    }
}

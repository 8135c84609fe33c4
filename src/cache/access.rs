//! Access Pattern Tracker
//!
//! Per-key hit counters and last-access timestamps. Heuristic input for
//! warm-up selection and eviction; no consistency guarantees are made.

use dashmap::DashMap;
use serde::Serialize;

use crate::cache::entry::current_timestamp_ms;

/// Access statistics for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessPattern {
    pub count: u64,
    /// Unix milliseconds
    pub last_access_at: u64,
}

/// Concurrent map of key access patterns.
#[derive(Debug, Default)]
pub struct AccessPatternTracker {
    patterns: DashMap<String, AccessPattern>,
}

impl AccessPatternTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one access to `key` at the current time.
    pub fn record_access(&self, key: &str) {
        self.record_access_at(key, current_timestamp_ms());
    }

    /// Records one access to `key` at `at_ms`.
    ///
    /// `last_access_at` never moves backwards.
    pub fn record_access_at(&self, key: &str, at_ms: u64) {
        if let Some(mut pattern) = self.patterns.get_mut(key) {
            pattern.count = pattern.count.saturating_add(1);
            pattern.last_access_at = pattern.last_access_at.max(at_ms);
            return;
        }

        self.patterns
            .entry(key.to_string())
            .and_modify(|p| {
                p.count = p.count.saturating_add(1);
                p.last_access_at = p.last_access_at.max(at_ms);
            })
            .or_insert(AccessPattern {
                count: 1,
                last_access_at: at_ms,
            });
    }

    /// Replaces the pattern for `key` outright.
    pub fn set_pattern(&self, key: &str, pattern: AccessPattern) {
        self.patterns.insert(key.to_string(), pattern);
    }

    pub fn get(&self, key: &str) -> Option<AccessPattern> {
        self.patterns.get(key).map(|p| *p)
    }

    /// Keys with `count > min_count` that were accessed within `window_ms` of `now_ms`,
    /// most frequently accessed first.
    pub fn hot_keys(&self, min_count: u64, window_ms: u64, now_ms: u64) -> Vec<(String, AccessPattern)> {
        let cutoff = now_ms.saturating_sub(window_ms);
        let mut hot: Vec<(String, AccessPattern)> = self
            .patterns
            .iter()
            .filter(|p| p.count > min_count && p.last_access_at >= cutoff)
            .map(|p| (p.key().clone(), *p.value()))
            .collect();

        hot.sort_by(|a, b| b.1.count.cmp(&a.1.count).then_with(|| a.0.cmp(&b.0)));
        hot
    }

    /// Drops patterns not accessed since `cutoff_ms`. Returns how many were removed.
    pub fn prune_older_than(&self, cutoff_ms: u64) -> usize {
        let before = self.patterns.len();
        self.patterns.retain(|_, p| p.last_access_at >= cutoff_ms);
        before.saturating_sub(self.patterns.len())
    }

    pub fn remove(&self, key: &str) {
        self.patterns.remove(key);
    }

    pub fn snapshot(&self) -> Vec<(String, AccessPattern)> {
        self.patterns
            .iter()
            .map(|p| (p.key().clone(), *p.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn clear(&self) {
        self.patterns.clear();
    }
}

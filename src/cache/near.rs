//! Near Cache Module
//!
//! In-process, size-bounded, TTL-aware key/value table shared by every request
//! path in the process. All operations are synchronous and in-memory.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::cache::access::AccessPatternTracker;
use crate::cache::entry::{current_timestamp_ms, CacheEntry};
use crate::cache::pattern::glob_match;
use crate::cache::policy::{EvictionCandidate, EvictionPolicy};

/// Outcome of a near cache read.
#[derive(Debug, Clone, PartialEq)]
pub enum NearLookup {
    Hit(Value),
    /// The entry was present but stale; it has been dropped
    Expired,
    Miss,
}

// == Near Cache ==
/// Concurrent near cache.
///
/// Invariant: `len() <= max_size()` once any mutating call returns.
#[derive(Debug)]
pub struct NearCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_size: usize,
    policy: EvictionPolicy,
    tracker: Arc<AccessPatternTracker>,
}

impl NearCache {
    // == Constructor ==
    /// Creates a near cache holding at most `max_size` entries (minimum 1).
    pub fn new(max_size: usize, policy: EvictionPolicy, tracker: Arc<AccessPatternTracker>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_size: max_size.max(1),
            policy,
            tracker,
        }
    }

    // == Get ==
    /// Reads a key. Expired entries are removed and reported as [`NearLookup::Expired`].
    pub fn get(&self, key: &str) -> NearLookup {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write();

        if let Some(entry) = entries.get_mut(key) {
            if !entry.is_expired_at(now) {
                entry.touch(now);
                return NearLookup::Hit(entry.data.clone());
            }
        } else {
            return NearLookup::Miss;
        }

        entries.remove(key);
        NearLookup::Expired
    }

    /// Reads a live value without counting it as an access.
    pub fn peek(&self, key: &str) -> Option<Value> {
        let now = current_timestamp_ms();
        self.entries
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .map(|entry| entry.data.clone())
    }

    /// Returns a copy of the raw entry, expired or not.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    /// True if the key is physically present, expired or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    // == Insert ==
    /// Stores `value` for `ttl_seconds`, then evicts down to capacity.
    ///
    /// Returns the number of entries evicted by the sweep.
    pub fn insert(&self, key: &str, value: Value, ttl_seconds: u64) -> usize {
        self.insert_entry(key, CacheEntry::new(value, ttl_seconds))
    }

    /// Stores a prepared entry, then evicts down to capacity.
    pub fn insert_entry(&self, key: &str, entry: CacheEntry) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), entry);

        let overflow = entries.len().saturating_sub(self.max_size);
        if overflow == 0 {
            return 0;
        }
        // The key just written is never its own victim
        self.evict_locked(&mut entries, overflow, now, Some(key))
    }

    // == Remove ==
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    /// Removes every listed key that is present. Returns how many were removed.
    pub fn remove_keys(&self, keys: &[String]) -> usize {
        let mut entries = self.entries.write();
        keys.iter().filter(|key| entries.remove(key.as_str()).is_some()).count()
    }

    /// Removes every key matching the glob `pattern`. Returns the removed keys.
    pub fn remove_matching(&self, pattern: &str) -> Vec<String> {
        let mut entries = self.entries.write();
        let matched: Vec<String> = entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        for key in &matched {
            entries.remove(key);
        }
        matched
    }

    // == Maintenance ==
    /// Removes all entries with `expires_at <= now`. Returns the number removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired_at(now));
        before - entries.len()
    }

    /// Evicts entries until the table is within capacity. Returns the number evicted.
    pub fn enforce_capacity(&self) -> usize {
        let now = current_timestamp_ms();
        let mut entries = self.entries.write();
        let overflow = entries.len().saturating_sub(self.max_size);
        if overflow == 0 {
            return 0;
        }
        self.evict_locked(&mut entries, overflow, now, None)
    }

    fn evict_locked(
        &self,
        entries: &mut HashMap<String, CacheEntry>,
        count: usize,
        now: u64,
        protect: Option<&str>,
    ) -> usize {
        let candidates: Vec<EvictionCandidate> = entries
            .iter()
            .filter(|(key, _)| Some(key.as_str()) != protect)
            .map(|(key, entry)| {
                let tracked = self.tracker.get(key);
                EvictionCandidate {
                    key: key.clone(),
                    last_access_at: tracked
                        .map(|p| p.last_access_at.max(entry.last_access_at))
                        .unwrap_or(entry.last_access_at),
                    access_count: tracked.map(|p| p.count.max(entry.hits)).unwrap_or(entry.hits),
                }
            })
            .collect();

        let victims = self.policy.select_victims(candidates, count, now);
        for key in &victims {
            entries.remove(key);
        }

        let evicted = victims.len();
        debug!(evicted, policy = %self.policy, "near cache eviction sweep");
        evicted
    }

    // == Introspection ==
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    /// Rough byte footprint of keys plus entries.
    pub fn approximate_memory_bytes(&self) -> usize {
        self.entries
            .read()
            .iter()
            .map(|(key, entry)| key.len() + entry.approximate_size())
            .sum()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Inserts without the capacity sweep, so maintenance can be exercised.
    #[cfg(test)]
    pub(crate) fn insert_unbounded(&self, key: &str, entry: CacheEntry) {
        self.entries.write().insert(key.to_string(), entry);
    }
}

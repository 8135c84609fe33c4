//! Cache Entry Module
//!
//! Defines the near cache entry: a JSON value plus its expiry and access metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

// == Cache Entry ==
/// A single near cache entry.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The cached value
    pub data: Value,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: u64,
    /// Last read timestamp (Unix milliseconds)
    pub last_access_at: u64,
    /// Number of reads served from this entry
    pub hits: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry that lives for `ttl_seconds`.
    ///
    /// A TTL of zero produces an entry that is already expired.
    pub fn new(data: Value, ttl_seconds: u64) -> Self {
        let now = current_timestamp_ms();
        Self::build(data, now, now.saturating_add(ttl_seconds.saturating_mul(1000)))
    }

    /// Creates an entry with an explicit expiry timestamp.
    pub fn with_expiry(data: Value, expires_at: u64) -> Self {
        Self::build(data, current_timestamp_ms(), expires_at)
    }

    fn build(data: Value, now: u64, expires_at: u64) -> Self {
        Self {
            data,
            created_at: now,
            expires_at,
            last_access_at: now,
            hits: 0,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is live only while `now < expires_at`.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against a caller-supplied clock reading.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at
    }

    /// Marks the entry as read.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_access_at = now_ms;
        self.hits = self.hits.saturating_add(1);
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, zero once expired.
    pub fn ttl_remaining_ms(&self) -> u64 {
        self.expires_at.saturating_sub(current_timestamp_ms())
    }

    /// Returns remaining TTL in whole seconds.
    pub fn ttl_remaining(&self) -> u64 {
        self.ttl_remaining_ms() / 1000
    }

    /// Rough in-memory footprint of the entry, used by the stats report.
    pub fn approximate_size(&self) -> usize {
        std::mem::size_of::<Self>() + approximate_value_size(&self.data)
    }
}

/// Rough heap footprint of a JSON value.
pub fn approximate_value_size(value: &Value) -> usize {
    match value {
        Value::Null | Value::Bool(_) => 1,
        Value::Number(_) => 8,
        Value::String(s) => s.len(),
        Value::Array(items) => items.iter().map(approximate_value_size).sum::<usize>() + 8,
        Value::Object(map) => {
            map.iter()
                .map(|(k, v)| k.len() + approximate_value_size(v))
                .sum::<usize>()
                + 16
        }
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

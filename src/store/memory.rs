//! In-memory far store
//!
//! Process-local stand-in for the shared store, used in standalone mode and in
//! tests. Honours TTLs and glob enumeration, and renders a status report in the
//! same `key:value` shape a Redis `INFO` reply uses.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use super::FarStore;
use crate::cache::{current_timestamp_ms, glob_match};
use crate::error::{CacheError, Result};

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: u64,
}

impl StoredValue {
    fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at
    }
}

/// DashMap-backed far store.
#[derive(Debug, Default)]
pub struct InMemoryFarStore {
    values: DashMap<String, StoredValue>,
    offline: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
}

impl InMemoryFarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every call fails until switched back on.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Remaining TTL in whole seconds (rounded up) of a live key.
    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        let now = current_timestamp_ms();
        self.values
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| (v.expires_at - now).div_ceil(1000))
    }

    /// Raw bytes of a live key, bypassing the offline switch.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        let now = current_timestamp_ms();
        self.values
            .get(key)
            .filter(|v| v.is_live(now))
            .map(|v| v.bytes.clone())
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = current_timestamp_ms();
        self.values.iter().filter(|v| v.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (reads, writes, deletes) served so far.
    pub fn op_counts(&self) -> (u64, u64, u64) {
        (
            self.reads.load(Ordering::Relaxed),
            self.writes.load(Ordering::Relaxed),
            self.deletes.load(Ordering::Relaxed),
        )
    }

    fn ensure_online(&self) -> Result<()> {
        if self.is_offline() {
            Err(CacheError::FarStore("in-memory far store is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn used_memory(&self) -> u64 {
        self.values
            .iter()
            .map(|v| (v.key().len() + v.bytes.len()) as u64)
            .sum()
    }
}

#[async_trait]
impl FarStore for InMemoryFarStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_online()?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let now = current_timestamp_ms();
        let live = self.values.get(key).map(|v| (v.is_live(now), v.bytes.clone()));
        match live {
            Some((true, bytes)) => Ok(Some(bytes)),
            Some((false, _)) => {
                self.values.remove_if(key, |_, v| !v.is_live(now));
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.ensure_online()?;
        self.reads.fetch_add(1, Ordering::Relaxed);

        let now = current_timestamp_ms();
        Ok(keys
            .iter()
            .map(|key| {
                self.values
                    .get(key)
                    .filter(|v| v.is_live(now))
                    .map(|v| v.bytes.clone())
            })
            .collect())
    }

    async fn set(&self, key: &str, ttl_seconds: u64, value: Vec<u8>) -> Result<()> {
        self.ensure_online()?;
        self.writes.fetch_add(1, Ordering::Relaxed);

        let expires_at = current_timestamp_ms().saturating_add(ttl_seconds.saturating_mul(1000));
        self.values.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        self.ensure_online()?;
        self.deletes.fetch_add(1, Ordering::Relaxed);

        let now = current_timestamp_ms();
        Ok(keys
            .iter()
            .filter_map(|key| self.values.remove(key))
            .filter(|(_, v)| v.is_live(now))
            .count())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.ensure_online()?;

        let now = current_timestamp_ms();
        let mut keys: Vec<String> = self
            .values
            .iter()
            .filter(|v| v.is_live(now) && glob_match(pattern, v.key()))
            .map(|v| v.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn server_stats(&self) -> Result<String> {
        self.ensure_online()?;

        let used = self.used_memory();
        Ok(format!(
            "# Memory\r\nused_memory:{}\r\nused_memory_human:{}\r\n# Clients\r\nconnected_clients:1\r\n",
            used,
            human_bytes(used)
        ))
    }

    async fn ping(&self) -> Result<()> {
        self.ensure_online()
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Formats a byte count the way Redis renders `used_memory_human`.
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];

    if bytes < 1024 {
        return format!("{}B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2}{}", value, UNITS[unit])
}

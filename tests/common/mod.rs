//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use layered_cache::error::{CacheError, Result};
use layered_cache::store::{FarStore, InMemoryFarStore};
use layered_cache::{CacheEngine, GetOptions};
use serde_json::{json, Value};

/// Runs `misses` cold loads through the engine, then `hits` near cache hits.
pub async fn drive_traffic(engine: &CacheEngine, hits: usize, misses: usize) {
    for i in 0..misses {
        let _: Value = engine
            .get_or_load(&format!("traffic:{}", i), GetOptions::default(), || async {
                Ok::<_, String>(json!(i))
            })
            .await
            .expect("cold load");
    }
    for _ in 0..hits {
        let _: Value = engine
            .get_or_load("traffic:0", GetOptions::default(), || async {
                Err::<Value, _>("traffic:0 should be cached".to_string())
            })
            .await
            .expect("near cache hit");
    }
}

/// In-memory far store that records every call and can be told to misbehave.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: InMemoryFarStore,
    sets: Mutex<Vec<(String, u64)>>,
    delete_batches: Mutex<Vec<usize>>,
    fail_reads: AtomicBool,
    fail_bulk_reads: AtomicBool,
    fail_deletes: AtomicBool,
    status_override: Mutex<Option<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `(key, ttl)` passed to `set`, in call order.
    pub fn sets(&self) -> Vec<(String, u64)> {
        self.sets.lock().clone()
    }

    pub fn ttl_written_for(&self, key: &str) -> Option<u64> {
        self.sets
            .lock()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, ttl)| *ttl)
    }

    /// Size of every `delete` call, in call order.
    pub fn delete_batches(&self) -> Vec<usize> {
        self.delete_batches.lock().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes only `get_many` fail, leaving single-key reads working.
    pub fn fail_bulk_reads(&self, fail: bool) {
        self.fail_bulk_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn set_status_report(&self, text: &str) {
        *self.status_override.lock() = Some(text.to_string());
    }

    /// Stores raw bytes without recording the write.
    pub async fn seed(&self, key: &str, ttl: u64, bytes: &[u8]) {
        self.inner
            .set(key, ttl, bytes.to_vec())
            .await
            .expect("seeding the in-memory store");
    }
}

#[async_trait]
impl FarStore for RecordingStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::FarStore("connection refused".to_string()));
        }
        self.inner.get(key).await
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if self.fail_reads.load(Ordering::SeqCst) || self.fail_bulk_reads.load(Ordering::SeqCst) {
            return Err(CacheError::FarStore("MGET rejected".to_string()));
        }
        self.inner.get_many(keys).await
    }

    async fn set(&self, key: &str, ttl_seconds: u64, value: Vec<u8>) -> Result<()> {
        self.sets.lock().push((key.to_string(), ttl_seconds));
        self.inner.set(key, ttl_seconds, value).await
    }

    async fn delete(&self, keys: &[String]) -> Result<usize> {
        self.delete_batches.lock().push(keys.len());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(CacheError::FarStore("READONLY replica".to_string()));
        }
        self.inner.delete(keys).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.inner.keys(pattern).await
    }

    async fn server_stats(&self) -> Result<String> {
        let status = self.status_override.lock().clone();
        match status {
            Some(text) => Ok(text),
            None => self.inner.server_stats().await,
        }
    }

    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

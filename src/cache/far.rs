//! Far Cache Module
//!
//! Thin wrapper over a [`FarStore`] that bounds every call with a timeout and
//! speaks JSON bytes. Errors are returned to the engine, which decides whether
//! to log and degrade.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use crate::cache::stats::FarCacheStats;
use crate::error::{CacheError, Result};
use crate::store::FarStore;

/// Timeout-bounded handle to the far store.
#[derive(Clone)]
pub struct FarCache {
    store: Arc<dyn FarStore>,
    timeout: Duration,
}

impl FarCache {
    pub fn new(store: Arc<dyn FarStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn FarStore> {
        &self.store
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::FarStoreTimeout(self.timeout)),
        }
    }

    /// Reads and decodes a JSON value.
    ///
    /// Bytes that are not valid JSON yield [`CacheError::Deserialization`].
    pub async fn get_json(&self, key: &str) -> Result<Option<Value>> {
        let bytes = self.bounded(self.store.get(key)).await?;
        bytes
            .map(|bytes| {
                serde_json::from_slice(&bytes)
                    .map_err(|e| CacheError::Deserialization(format!("{}: {}", key, e)))
            })
            .transpose()
    }

    /// Reads several keys in one store call, results in `keys` order.
    ///
    /// An entry that is not valid JSON comes back as `None` on its own; only a
    /// failure of the bulk call itself is an error.
    pub async fn get_json_many(&self, keys: &[String]) -> Result<Vec<Option<Value>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let raw = self.bounded(self.store.get_many(keys)).await?;
        if raw.len() != keys.len() {
            return Err(CacheError::FarStore(format!(
                "bulk read returned {} values for {} keys",
                raw.len(),
                keys.len()
            )));
        }

        Ok(keys
            .iter()
            .zip(raw)
            .map(|(key, bytes)| {
                let bytes = bytes?;
                match serde_json::from_slice(&bytes) {
                    Ok(value) => Some(value),
                    Err(e) => {
                        debug!(key = %key, error = %e, "skipping undecodable far cache entry");
                        None
                    }
                }
            })
            .collect())
    }

    /// Encodes `value` as JSON and stores it for `ttl_seconds`.
    pub async fn set_json(&self, key: &str, ttl_seconds: u64, value: &Value) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))?;
        self.bounded(self.store.set(key, ttl_seconds, bytes)).await
    }

    pub async fn delete(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.bounded(self.store.delete(keys)).await
    }

    pub async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.bounded(self.store.keys(pattern)).await
    }

    /// Raw status report from the server.
    pub async fn server_stats(&self) -> Result<String> {
        self.bounded(self.store.server_stats()).await
    }

    /// Pings the store and returns the round-trip time.
    pub async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        self.bounded(self.store.ping()).await?;
        Ok(started.elapsed())
    }
}

/// Extracts memory and client figures from a `key:value` status report.
///
/// Each field falls back to its default independently when absent or unparseable.
pub fn parse_server_info(text: &str) -> FarCacheStats {
    let mut stats = FarCacheStats::default();
    let mut recognised = 0usize;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((field, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match field.trim() {
            "used_memory" => {
                if let Ok(bytes) = value.parse() {
                    stats.memory_usage = bytes;
                    recognised += 1;
                }
            }
            "used_memory_human" if !value.is_empty() => {
                stats.memory_usage_human = value.to_string();
                recognised += 1;
            }
            "connected_clients" => {
                if let Ok(clients) = value.parse() {
                    stats.connected_clients = clients;
                    recognised += 1;
                }
            }
            _ => {}
        }
    }

    if recognised == 0 && !text.trim().is_empty() {
        debug!("far cache status report had no recognised fields");
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryFarStore;
    use async_trait::async_trait;

    #[test]
    fn test_parse_server_info() {
        let stats = parse_server_info(
            "used_memory:1048576\r\nused_memory_human:1.00M\r\nconnected_clients:10",
        );
        assert_eq!(stats.memory_usage, 1_048_576);
        assert_eq!(stats.memory_usage_human, "1.00M");
        assert_eq!(stats.connected_clients, 10);
    }

    #[test]
    fn test_parse_server_info_garbage() {
        assert_eq!(parse_server_info("invalid_info_format"), FarCacheStats::default());
        assert_eq!(parse_server_info(""), FarCacheStats::default());
    }

    #[test]
    fn test_parse_server_info_fields_default_independently() {
        let stats = parse_server_info(
            "# Memory\nused_memory:abc\nused_memory_human:2.50K\n# Clients\nconnected_clients:3\n",
        );
        assert_eq!(stats.memory_usage, 0);
        assert_eq!(stats.memory_usage_human, "2.50K");
        assert_eq!(stats.connected_clients, 3);
    }

    #[tokio::test]
    async fn test_json_round_trip_through_store() {
        let store = Arc::new(InMemoryFarStore::new());
        let far = FarCache::new(store.clone(), Duration::from_millis(100));

        far.set_json("k", 60, &serde_json::json!({"a": 1})).await.unwrap();
        assert_eq!(store.raw("k").unwrap(), br#"{"a":1}"#.to_vec());
        assert_eq!(far.get_json("k").await.unwrap(), Some(serde_json::json!({"a": 1})));
        assert_eq!(far.get_json("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_undecodable_bytes() {
        let store = Arc::new(InMemoryFarStore::new());
        store.set("bad", 60, b"not json".to_vec()).await.unwrap();
        let far = FarCache::new(store, Duration::from_millis(100));

        assert!(matches!(far.get_json("bad").await, Err(CacheError::Deserialization(_))));
    }

    #[tokio::test]
    async fn test_get_json_many_isolates_bad_entries() {
        let store = Arc::new(InMemoryFarStore::new());
        store.set("good", 60, br#"{"id":1}"#.to_vec()).await.unwrap();
        store.set("bad", 60, b"{truncated".to_vec()).await.unwrap();
        let far = FarCache::new(store, Duration::from_millis(100));

        let keys = vec!["good".to_string(), "bad".to_string(), "missing".to_string()];
        let values = far.get_json_many(&keys).await.unwrap();

        assert_eq!(values, vec![Some(serde_json::json!({"id": 1})), None, None]);
        assert!(far.get_json_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ping_reports_round_trip() {
        let store = Arc::new(InMemoryFarStore::new());
        let far = FarCache::new(store.clone(), Duration::from_millis(100));

        assert!(far.ping().await.unwrap() < Duration::from_millis(100));
        store.set_offline(true);
        assert!(matches!(far.ping().await, Err(CacheError::FarStore(_))));
    }

    struct StalledStore;

    #[async_trait]
    impl FarStore for StalledStore {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            std::future::pending().await
        }
        async fn get_many(&self, _keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
            std::future::pending().await
        }
        async fn set(&self, _key: &str, _ttl: u64, _value: Vec<u8>) -> Result<()> {
            std::future::pending().await
        }
        async fn delete(&self, _keys: &[String]) -> Result<usize> {
            std::future::pending().await
        }
        async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
            std::future::pending().await
        }
        async fn server_stats(&self) -> Result<String> {
            std::future::pending().await
        }
        async fn ping(&self) -> Result<()> {
            std::future::pending().await
        }
        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_calls_are_bounded_by_timeout() {
        let far = FarCache::new(Arc::new(StalledStore), Duration::from_millis(20));

        let err = far.get_json("k").await.unwrap_err();
        assert!(matches!(err, CacheError::FarStoreTimeout(_)));
        assert!(err.is_far_unavailable());
        assert!(far.keys("*").await.is_err());
        assert!(matches!(far.ping().await, Err(CacheError::FarStoreTimeout(_))));
        assert!(far.get_json_many(&["k".to_string()]).await.is_err());
        // Empty deletes never reach the store
        assert_eq!(far.delete(&[]).await.unwrap(), 0);
    }
}

//! Far Cache Stores
//!
//! The remote, shared key/value service behind the far cache layer. Connection
//! lifecycle, authentication and retries belong to the store implementation.

mod memory;
mod redis_store;

use async_trait::async_trait;

use crate::error::Result;

pub use self::memory::{human_bytes, InMemoryFarStore};
pub use self::redis_store::RedisFarStore;

/// Remote key/value store contract.
#[async_trait]
pub trait FarStore: Send + Sync {
    /// Fetch the raw bytes stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Fetch several keys in one round trip; results follow `keys` order
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Store `value` under `key` for `ttl_seconds`
    async fn set(&self, key: &str, ttl_seconds: u64, value: Vec<u8>) -> Result<()>;

    /// Delete the given keys, returning how many existed
    async fn delete(&self, keys: &[String]) -> Result<usize>;

    /// Enumerate keys matching a glob pattern
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Free-text server status report (`key:value` lines)
    async fn server_stats(&self) -> Result<String>;

    /// Round-trip liveness check
    async fn ping(&self) -> Result<()>;

    /// Short backend name for logs
    fn name(&self) -> &'static str;
}

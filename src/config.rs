//! Configuration Module
//!
//! Handles loading engine and server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use crate::cache::EvictionPolicy;

/// Warm-up scheduling and selection thresholds.
#[derive(Debug, Clone, Serialize)]
pub struct WarmupConfig {
    /// Run the periodic warm-up task
    pub enabled: bool,
    /// Seconds between periodic warm-up runs
    pub interval: u64,
    /// A key must have been hit more than this many times to be warmed
    pub min_count: u64,
    /// A key must have been hit within this many seconds to be warmed
    pub recency_window: u64,
    /// Far cache TTL for warmed keys no strategy claims
    pub default_ttl: u64,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 3600,
            min_count: 10,
            recency_window: 600,
            default_ttl: 300,
        }
    }
}

/// Engine and server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Maximum number of entries the near cache can hold
    pub max_l1_entries: usize,
    /// Near cache TTL in seconds when the caller gives none
    pub default_l1_ttl: u64,
    /// Far cache TTL in seconds when the caller gives none
    pub default_l2_ttl: u64,
    /// Upper bound on any single far cache call, in milliseconds
    pub far_timeout_ms: u64,
    /// Far cache connection URL; the in-memory store is used when unset
    #[serde(skip_serializing)]
    pub far_cache_url: Option<String>,
    /// HTTP server port
    pub server_port: u16,
    /// Background maintenance interval in seconds
    pub cleanup_interval: u64,
    /// Near cache eviction policy
    pub eviction_policy: EvictionPolicy,
    /// Collapse concurrent loads of the same missing key into one
    pub coalesce_loads: bool,
    /// Warm-up settings
    pub warmup: WarmupConfig,
    /// Access patterns idle for longer than this many seconds are pruned
    pub access_retention: u64,
    /// Optional JSON file replacing the built-in strategy table
    pub strategies_file: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `L1_MAX_ENTRIES` - Near cache capacity (default: 1000)
    /// - `L1_DEFAULT_TTL` / `L2_DEFAULT_TTL` - Default TTLs in seconds (default: 60 / 300)
    /// - `FAR_CACHE_URL` - e.g. `redis://127.0.0.1/` (default: unset, in-memory store)
    /// - `FAR_CACHE_TIMEOUT_MS` - Far cache call timeout (default: 500)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Maintenance frequency in seconds (default: 30)
    /// - `L1_EVICTION_POLICY` - `recency`, `frequency` or `blended` (default: blended)
    /// - `COALESCE_LOADS` - Single-flight loads (default: false)
    /// - `WARMUP_ENABLED`, `WARMUP_INTERVAL`, `WARMUP_MIN_COUNT`,
    ///   `WARMUP_RECENCY_WINDOW`, `WARMUP_DEFAULT_TTL` - Warm-up settings
    /// - `ACCESS_RETENTION` - Access pattern retention in seconds (default: 86400)
    /// - `CACHE_STRATEGIES_FILE` - JSON strategy table (default: built-in table)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let warmup_defaults = WarmupConfig::default();

        Self {
            max_l1_entries: env_or("L1_MAX_ENTRIES", defaults.max_l1_entries),
            default_l1_ttl: env_or("L1_DEFAULT_TTL", defaults.default_l1_ttl),
            default_l2_ttl: env_or("L2_DEFAULT_TTL", defaults.default_l2_ttl),
            far_timeout_ms: env_or("FAR_CACHE_TIMEOUT_MS", defaults.far_timeout_ms),
            far_cache_url: env::var("FAR_CACHE_URL").ok().filter(|v| !v.is_empty()),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            eviction_policy: env_or("L1_EVICTION_POLICY", defaults.eviction_policy),
            coalesce_loads: env_flag("COALESCE_LOADS", defaults.coalesce_loads),
            warmup: WarmupConfig {
                enabled: env_flag("WARMUP_ENABLED", warmup_defaults.enabled),
                interval: env_or("WARMUP_INTERVAL", warmup_defaults.interval),
                min_count: env_or("WARMUP_MIN_COUNT", warmup_defaults.min_count),
                recency_window: env_or("WARMUP_RECENCY_WINDOW", warmup_defaults.recency_window),
                default_ttl: env_or("WARMUP_DEFAULT_TTL", warmup_defaults.default_ttl),
            },
            access_retention: env_or("ACCESS_RETENTION", defaults.access_retention),
            strategies_file: env::var("CACHE_STRATEGIES_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Far cache call timeout as a Duration.
    pub fn far_timeout(&self) -> Duration {
        Duration::from_millis(self.far_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_l1_entries: 1000,
            default_l1_ttl: 60,
            default_l2_ttl: 300,
            far_timeout_ms: 500,
            far_cache_url: None,
            server_port: 3000,
            cleanup_interval: 30,
            eviction_policy: EvictionPolicy::default(),
            coalesce_loads: false,
            warmup: WarmupConfig::default(),
            access_retention: 86_400,
            strategies_file: None,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(v) => matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_l1_entries, 1000);
        assert_eq!(config.default_l1_ttl, 60);
        assert_eq!(config.default_l2_ttl, 300);
        assert_eq!(config.far_timeout(), Duration::from_millis(500));
        assert!(config.far_cache_url.is_none());
        assert!(!config.coalesce_loads);
        assert_eq!(config.warmup.min_count, 10);
        assert_eq!(config.warmup.recency_window, 600);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        for name in [
            "L1_MAX_ENTRIES",
            "L1_DEFAULT_TTL",
            "L2_DEFAULT_TTL",
            "FAR_CACHE_URL",
            "FAR_CACHE_TIMEOUT_MS",
            "CLEANUP_INTERVAL",
            "L1_EVICTION_POLICY",
            "COALESCE_LOADS",
            "WARMUP_ENABLED",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env();
        assert_eq!(config.max_l1_entries, 1000);
        assert_eq!(config.default_l1_ttl, 60);
        assert_eq!(config.cleanup_interval, 30);
        assert_eq!(config.eviction_policy, EvictionPolicy::default());
        assert!(!config.warmup.enabled);
    }

    #[test]
    fn test_env_flag_parsing() {
        env::set_var("LAYERED_CACHE_TEST_FLAG", "Yes");
        assert!(env_flag("LAYERED_CACHE_TEST_FLAG", false));
        env::set_var("LAYERED_CACHE_TEST_FLAG", "0");
        assert!(!env_flag("LAYERED_CACHE_TEST_FLAG", true));
        env::remove_var("LAYERED_CACHE_TEST_FLAG");
        assert!(env_flag("LAYERED_CACHE_TEST_FLAG", true));
    }

    #[test]
    fn test_env_or_ignores_garbage() {
        env::set_var("LAYERED_CACHE_TEST_NUM", "not-a-number");
        assert_eq!(env_or("LAYERED_CACHE_TEST_NUM", 42u64), 42);
        env::set_var("LAYERED_CACHE_TEST_NUM", " 7 ");
        assert_eq!(env_or("LAYERED_CACHE_TEST_NUM", 42u64), 7);
        env::remove_var("LAYERED_CACHE_TEST_NUM");
    }
}

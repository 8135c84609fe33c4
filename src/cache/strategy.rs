//! Cache Strategy Table
//!
//! Named TTL bundles so call sites can say "analytics-aggregated" instead of
//! passing raw numbers. Loaded once at startup and immutable afterwards.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::pattern::glob_match;
use crate::error::{CacheError, Result};

/// A named bundle of TTL defaults for one class of cached data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStrategy {
    pub name: String,
    pub l1_ttl_seconds: u64,
    pub l2_ttl_seconds: u64,
    /// Whether keys of this class may be re-populated by warm-up
    #[serde(default)]
    pub warmup_enabled: bool,
    /// Key globs this strategy claims for warm-up
    #[serde(default)]
    pub preload_patterns: Vec<String>,
}

impl CacheStrategy {
    pub fn new(name: &str, l1_ttl_seconds: u64, l2_ttl_seconds: u64) -> Self {
        Self {
            name: name.to_string(),
            l1_ttl_seconds,
            l2_ttl_seconds,
            warmup_enabled: false,
            preload_patterns: Vec::new(),
        }
    }

    pub fn with_preload(mut self, patterns: &[&str]) -> Self {
        self.warmup_enabled = true;
        self.preload_patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    /// True if warm-up is enabled and one of the preload patterns matches `key`.
    pub fn claims(&self, key: &str) -> bool {
        self.warmup_enabled && self.preload_patterns.iter().any(|p| glob_match(p, key))
    }
}

// == Strategy Table ==
/// Process-wide strategy lookup.
#[derive(Debug, Clone)]
pub struct StrategyTable {
    strategies: HashMap<String, CacheStrategy>,
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::from_strategies(vec![
            CacheStrategy::new("user-profile", 300, 1800).with_preload(&["user:*:profile"]),
            CacheStrategy::new("dashboard-metadata", 120, 900)
                .with_preload(&["dashboard:*:metadata"]),
            CacheStrategy::new("dashboard-data", 60, 300),
            CacheStrategy::new("dashboard-list", 60, 600),
            CacheStrategy::new("analytics-aggregated", 300, 3600)
                .with_preload(&["analytics:*:daily", "analytics:*:weekly"]),
            CacheStrategy::new("search-results", 180, 600),
        ])
    }
}

impl StrategyTable {
    pub fn from_strategies(strategies: Vec<CacheStrategy>) -> Self {
        Self {
            strategies: strategies.into_iter().map(|s| (s.name.clone(), s)).collect(),
        }
    }

    /// Parses a JSON array of strategies.
    pub fn from_json(json: &str) -> Result<Self> {
        let strategies: Vec<CacheStrategy> = serde_json::from_str(json)
            .map_err(|e| CacheError::Config(format!("invalid strategy table: {}", e)))?;
        Ok(Self::from_strategies(strategies))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn get(&self, name: &str) -> Option<&CacheStrategy> {
        self.strategies.get(name)
    }

    /// First warm-up enabled strategy (by name order) whose preload patterns match `key`.
    pub fn for_warm_key(&self, key: &str) -> Option<&CacheStrategy> {
        let mut names: Vec<&String> = self.strategies.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|name| self.strategies.get(name))
            .find(|s| s.claims(key))
    }

    /// Strategy names in sorted order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

/// Joins a prefix and the non-empty parts with `:`.
pub fn build_key<S: AsRef<str>>(prefix: &str, parts: &[S]) -> String {
    std::iter::once(prefix)
        .chain(parts.iter().map(|p| p.as_ref()))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_ttls() {
        let table = StrategyTable::default();
        assert_eq!(table.get("user-profile").unwrap().l2_ttl_seconds, 1800);
        assert_eq!(table.get("dashboard-metadata").unwrap().l2_ttl_seconds, 900);
        assert_eq!(table.get("analytics-aggregated").unwrap().l2_ttl_seconds, 3600);
        assert_eq!(table.get("search-results").unwrap().l2_ttl_seconds, 600);
        assert!(table.get("test").is_none());
        assert_eq!(table.len(), 6);
    }

    #[test]
    fn test_for_warm_key() {
        let table = StrategyTable::default();
        assert_eq!(
            table.for_warm_key("analytics:dash_1:daily").map(|s| s.name.as_str()),
            Some("analytics-aggregated")
        );
        assert_eq!(
            table.for_warm_key("user:123:profile").map(|s| s.name.as_str()),
            Some("user-profile")
        );
        assert!(table.for_warm_key("search:abc").is_none());
    }

    #[test]
    fn test_from_json() {
        let table = StrategyTable::from_json(
            r#"[{"name": "reports", "l1_ttl_seconds": 30, "l2_ttl_seconds": 120}]"#,
        )
        .unwrap();

        let reports = table.get("reports").unwrap();
        assert_eq!(reports.l1_ttl_seconds, 30);
        assert!(!reports.warmup_enabled);
        assert!(reports.preload_patterns.is_empty());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(StrategyTable::from_json("{"), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_build_key() {
        assert_eq!(build_key("dashboard", &["list", "user_1", "abc"]), "dashboard:list:user_1:abc");
        assert_eq!(build_key("user", &["", "123"]), "user:123");
        assert_eq!(build_key::<&str>("system", &[]), "system");
    }
}

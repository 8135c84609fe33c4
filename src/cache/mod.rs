//! Cache Module
//!
//! Two-layer read-through cache: a bounded in-process near cache in front of a
//! shared far cache, with pattern invalidation, warm-up and statistics.

mod access;
mod engine;
mod entry;
mod far;
mod near;
mod pattern;
mod policy;
mod stats;
mod strategy;


// Re-export public types
pub use access::{AccessPattern, AccessPatternTracker};
pub use engine::{
    CacheEngine, GetOptions, HealthReport, HealthStatus, InvalidationRecord, InvalidationReport,
    WarmupReport, WarmupSource,
};
pub use entry::{current_timestamp_ms, CacheEntry};
pub use far::{parse_server_info, FarCache};
pub use near::{NearCache, NearLookup};
pub use pattern::{glob_match, glob_to_regex};
pub use policy::{EvictionCandidate, EvictionPolicy};
pub use stats::{
    CacheStatsSnapshot, FarCacheStats, Metrics, MetricsSnapshot, NearCacheStats,
    PerformanceStats, RequestOutcome, StrategyAnalytics, StrategyAnalyticsReport,
};
pub use strategy::{build_key, CacheStrategy, StrategyTable};

// == Public Constants ==
/// Maximum number of keys in one far cache delete call
pub const INVALIDATION_BATCH_SIZE: usize = 100;

/// Invalidation records kept for the audit log
pub const AUDIT_LOG_CAPACITY: usize = 100;

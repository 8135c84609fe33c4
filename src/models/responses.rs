//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies. Engine reports that
//! are already serializable are returned as-is.

use serde::Serialize;

use crate::cache::{CacheStatsSnapshot, HealthReport, InvalidationRecord, MetricsSnapshot};

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStatsSnapshot,
    /// Detailed counters behind the summary figures
    pub counters: MetricsSnapshot,
}

/// Response body for GET /invalidations
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationsResponse {
    pub invalidations: Vec<InvalidationRecord>,
}

/// Response body for administrative actions without a report
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Status, far store latency and hit rate
    #[serde(flatten)]
    pub report: HealthReport,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    /// Entries currently in the near cache
    pub near_entries: usize,
    /// Far store backend name
    pub far_store: String,
}

impl HealthResponse {
    /// Wraps a health report with the current timestamp
    pub fn new(report: HealthReport, near_entries: usize, far_store: &str) -> Self {
        Self {
            report,
            timestamp: chrono::Utc::now().to_rfc3339(),
            near_entries,
            far_store: far_store.to_string(),
        }
    }
}

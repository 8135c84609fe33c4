//! Pattern invalidation across both layers.

use serde::Serialize;
use tracing::{debug, info, warn};

use super::CacheEngine;
use crate::cache::{AUDIT_LOG_CAPACITY, INVALIDATION_BATCH_SIZE};

/// Outcome of one invalidation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    pub pattern: String,
    pub reason: String,
    /// Far cache keys the pattern enumerated
    pub matched: usize,
    pub far_deleted: usize,
    pub near_removed: usize,
    pub failed_batches: usize,
    /// False when the far cache could not be enumerated
    pub far_available: bool,
}

impl InvalidationReport {
    fn new(pattern: &str, reason: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
            matched: 0,
            far_deleted: 0,
            near_removed: 0,
            failed_batches: 0,
            far_available: true,
        }
    }
}

/// Audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationRecord {
    pub pattern: String,
    pub reason: String,
    pub matched: usize,
    pub near_removed: usize,
    /// RFC 3339
    pub at: String,
}

impl CacheEngine {
    /// Removes every key matching the glob `pattern` from both layers.
    ///
    /// Far deletes go out in batches of at most [`INVALIDATION_BATCH_SIZE`].
    /// No far match means no action. Far failures are logged and absorbed; if
    /// the far cache cannot be enumerated at all the near cache is still swept.
    pub async fn invalidate(&self, pattern: &str, reason: &str) -> InvalidationReport {
        let mut report = InvalidationReport::new(pattern, reason);

        match self.far.keys(pattern).await {
            Ok(keys) if keys.is_empty() => {
                debug!(pattern = %pattern, reason = %reason, "no keys to invalidate");
                return report;
            }
            Ok(keys) => {
                report.matched = keys.len();
                for batch in keys.chunks(INVALIDATION_BATCH_SIZE) {
                    match self.far.delete(batch).await {
                        Ok(deleted) => report.far_deleted += deleted,
                        Err(e) => {
                            report.failed_batches += 1;
                            self.metrics.record_far_error();
                            warn!(
                                pattern = %pattern,
                                batch_size = batch.len(),
                                error = %e,
                                "far cache delete batch failed"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                report.far_available = false;
                self.metrics.record_far_error();
                warn!(pattern = %pattern, error = %e, "far cache enumeration failed, sweeping near cache only");
            }
        }

        report.near_removed = self.near.remove_matching(pattern).len();
        self.metrics.record_invalidation();
        self.record_invalidation(&report);

        info!(
            pattern = %pattern,
            reason = %reason,
            matched = report.matched,
            far_deleted = report.far_deleted,
            near_removed = report.near_removed,
            "cache invalidated"
        );
        report
    }

    /// Removes one exact key from both layers.
    pub async fn invalidate_key(&self, key: &str, reason: &str) -> InvalidationReport {
        let mut report = InvalidationReport::new(key, reason);

        match self.far.delete(&[key.to_string()]).await {
            Ok(deleted) => report.far_deleted = deleted,
            Err(e) => {
                report.far_available = false;
                self.metrics.record_far_error();
                warn!(key = %key, error = %e, "far cache delete failed");
            }
        }
        report.near_removed = usize::from(self.near.remove(key));
        report.matched = report.far_deleted.max(report.near_removed);

        self.metrics.record_invalidation();
        self.record_invalidation(&report);
        debug!(key = %key, reason = %reason, "key invalidated");
        report
    }

    /// Most recent invalidations, newest first.
    pub fn recent_invalidations(&self) -> Vec<InvalidationRecord> {
        self.audit_log.lock().iter().rev().cloned().collect()
    }

    fn record_invalidation(&self, report: &InvalidationReport) {
        let mut log = self.audit_log.lock();
        if log.len() >= AUDIT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(InvalidationRecord {
            pattern: report.pattern.clone(),
            reason: report.reason.clone(),
            matched: report.matched,
            near_removed: report.near_removed,
            at: chrono::Utc::now().to_rfc3339(),
        });
    }
}

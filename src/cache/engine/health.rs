//! Far store liveness check.

use serde::Serialize;
use tracing::warn;

use super::CacheEngine;
use crate::cache::far::parse_server_info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of [`CacheEngine::health_check`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// Far store round trip in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    /// Overall hit rate as a percentage
    pub hit_rate: f64,
    /// Far store memory use, as the server reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

impl CacheEngine {
    /// Pings the far store within the configured timeout.
    ///
    /// Healthy reports carry the round trip and the hit rate; a failed ping
    /// reports `unhealthy` with the error.
    pub async fn health_check(&self) -> HealthReport {
        let hit_rate = self.metrics.snapshot().hit_rate();

        let latency = match self.far.ping().await {
            Ok(latency) => latency,
            Err(e) => {
                warn!(store = self.far.store().name(), error = %e, "far store health check failed");
                self.metrics.record_far_error();
                return HealthReport {
                    status: HealthStatus::Unhealthy,
                    latency_ms: None,
                    hit_rate,
                    memory: None,
                    error: Some(e.to_string()),
                };
            }
        };

        let memory = self
            .far
            .server_stats()
            .await
            .ok()
            .map(|text| parse_server_info(&text).memory_usage_human);

        HealthReport {
            status: HealthStatus::Healthy,
            latency_ms: Some(latency.as_secs_f64() * 1000.0),
            hit_rate,
            memory,
            error: None,
        }
    }
}

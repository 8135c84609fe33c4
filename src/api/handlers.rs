//! API Handlers
//!
//! HTTP request handlers for the cache admin endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::{CacheEngine, InvalidationReport, StrategyAnalyticsReport, WarmupReport};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    HealthResponse, InvalidateRequest, InvalidationsResponse, MessageResponse, StatsResponse,
    WarmupRequest,
};
use crate::store::FarStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CacheEngine>,
}

impl AppState {
    pub fn new(engine: CacheEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    /// Builds the engine from configuration over the given far store.
    pub fn from_config(config: Config, store: Arc<dyn FarStore>) -> Result<Self> {
        Ok(Self::new(CacheEngine::from_config(config, store)?))
    }
}

/// Handler for GET /health
///
/// Answers 503 when the far store does not respond to a ping.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.engine.health_check().await;
    let code = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse::new(
        report,
        state.engine.near().len(),
        state.engine.far().store().name(),
    );
    (code, Json(response))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let stats = state.engine.get_cache_stats().await;
    Json(StatsResponse {
        stats,
        counters: state.engine.metrics().snapshot(),
    })
}

/// Handler for GET /stats/strategies
pub async fn strategy_stats_handler(
    State(state): State<AppState>,
) -> Json<StrategyAnalyticsReport> {
    Json(state.engine.strategy_analytics())
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidationReport>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let report = state.engine.invalidate(&req.pattern, &req.reason).await;
    Ok(Json(report))
}

/// Handler for GET /invalidations
pub async fn invalidations_handler(State(state): State<AppState>) -> Json<InvalidationsResponse> {
    Json(InvalidationsResponse {
        invalidations: state.engine.recent_invalidations(),
    })
}

/// Handler for POST /warmup
///
/// A missing or unreadable body runs the baseline warm-up.
pub async fn warmup_handler(
    State(state): State<AppState>,
    req: Option<Json<WarmupRequest>>,
) -> Json<WarmupReport> {
    let Json(req) = req.unwrap_or_default();
    Json(state.engine.warmup_cache(req.full).await)
}

/// Handler for PUT /warmup/dashboard/:id
pub async fn warm_dashboard_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(data): Json<Value>,
) -> Result<Json<WarmupReport>> {
    if id.trim().is_empty() {
        return Err(CacheError::InvalidRequest("Dashboard id cannot be empty".to_string()));
    }
    if !data.is_object() {
        return Err(CacheError::InvalidRequest(
            "Dashboard body must be a JSON object".to_string(),
        ));
    }

    Ok(Json(state.engine.warm_dashboard_cache(&id, &data).await))
}

/// Handler for DELETE /metrics
pub async fn reset_metrics_handler(State(state): State<AppState>) -> Json<MessageResponse> {
    state.engine.reset_metrics();
    info!("Cache metrics reset");
    Json(MessageResponse::new("Metrics reset"))
}

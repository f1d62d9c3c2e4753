use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::error::AppError;
use crate::service::HoldingsService;
use crate::types::Snapshot;

#[derive(Clone)]
pub struct ApiState {
    pub holdings: HoldingsService,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/holdings", get(get_holdings))
        .route("/health", get(get_health))
        // Same handlers under /api for serverless-style deployments.
        .route("/api/holdings", get(get_holdings))
        .route("/api/health", get(get_health))
        .route("/stats/refresh", get(get_refresh_stats))
        .layer(middleware::from_fn(log_request))
        .layer(cors)
        .with_state(state)
}

async fn log_request(req: Request, next: Next) -> Response {
    info!(
        method = %req.method(),
        path = %req.uri().path(),
        "{} {}",
        req.method(),
        req.uri().path()
    );
    next.run(req).await
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshStatsResponse {
    pub cache_state: String,
    pub refreshing: bool,
    pub snapshot_taken_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub item_count: Option<usize>,
    pub refresh_successes: u64,
    pub refresh_failures: u64,
    pub stale_served: u64,
    pub persisted_loads: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub extract_samples: u64,
    pub extract_p50_ms: Option<u64>,
    pub extract_p95_ms: Option<u64>,
    pub extract_p99_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_holdings(State(state): State<ApiState>) -> Result<Json<Arc<Snapshot>>, AppError> {
    let snapshot = state.holdings.get_holdings().await?;
    Ok(Json(snapshot))
}

async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
    })
}

async fn get_refresh_stats(State(state): State<ApiState>) -> Json<RefreshStatsResponse> {
    Json(refresh_stats(&state))
}

fn refresh_stats(state: &ApiState) -> RefreshStatsResponse {
    let cache = state.holdings.cache();
    let current = cache.current();
    let (p50, p95, p99) = state.latency.percentiles();
    let last_success_ms = state.health.last_success_at_ms();

    RefreshStatsResponse {
        cache_state: cache.state().to_string(),
        refreshing: cache.is_refreshing(),
        snapshot_taken_at: current.as_ref().map(|s| s.timestamp),
        fetched_at: cache.fetched_at(),
        item_count: current.as_ref().map(|s| s.item_count),
        refresh_successes: state.health.refresh_successes(),
        refresh_failures: state.health.refresh_failures(),
        stale_served: state.health.stale_served(),
        persisted_loads: state.health.persisted_loads(),
        last_success_at: (last_success_ms > 0)
            .then(|| DateTime::from_timestamp_millis(last_success_ms))
            .flatten(),
        extract_samples: state.latency.len(),
        extract_p50_ms: p50,
        extract_p95_ms: p95,
        extract_p99_ms: p99,
    }
}

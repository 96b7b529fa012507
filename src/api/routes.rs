use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::db::models::{AccumulationRow, DistributionRow, ScanRunRow, SharkRow};
use crate::error::AppError;
use crate::scan::aggregator::ScanSummary;
use crate::state::ResultStore;
use crate::types::{AccumulationResult, DistributionResult, SharkCategory, SharkResult, Signal};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<ResultStore>,
    pub pool: sqlx::SqlitePool,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/accumulation", get(get_accumulation))
        .route("/accumulation/:ticker", get(get_accumulation_ticker))
        .route("/accumulation/:ticker/history", get(get_accumulation_history))
        .route("/distribution", get(get_distribution))
        .route("/distribution/:ticker/history", get(get_distribution_history))
        .route("/sharks", get(get_sharks))
        .route("/sharks/:ticker/history", get(get_shark_history))
        .route("/scans", get(get_scans))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
pub struct AccumulationQuery {
    pub signal: Option<String>,
    pub min_score: Option<f64>,
}

#[derive(Deserialize, Default)]
pub struct DistributionQuery {
    pub min_score: Option<f64>,
}

#[derive(Deserialize, Default)]
pub struct SharksQuery {
    pub category: Option<String>,
    pub silent_only: Option<bool>,
}

#[derive(Deserialize, Default)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub scan_running: bool,
    pub last_scan_at_ns: u64,
    pub scans_completed: u64,
    pub tickers_last_scan: u64,
    pub write_queue_pending: u64,
    pub accumulation_results: usize,
    pub distribution_results: usize,
    pub shark_results: usize,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub scanned_at_ns: u64,
    pub summary: ScanSummary,
    pub top_accumulation: Vec<AccumulationResult>,
    pub top_distribution: Vec<DistributionResult>,
    pub top_sharks: Vec<SharkResult>,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub samples: u64,
    pub p50_us: Option<u64>,
    pub p95_us: Option<u64>,
    pub p99_us: Option<u64>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

const SUMMARY_TOP: usize = 10;

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let h = &state.health;
    let status = if h.scans_completed() > 0 { "ok" } else { "starting" };
    Json(HealthResponse {
        status,
        scan_running: h.scan_running(),
        last_scan_at_ns: h.last_scan_at_ns(),
        scans_completed: h.scans_completed(),
        tickers_last_scan: h.tickers_last_scan(),
        write_queue_pending: h.write_queue_pending(),
        accumulation_results: state.store.accumulation_count(),
        distribution_results: state.store.distribution_count(),
        shark_results: state.store.shark_count(),
    })
}

async fn get_accumulation(
    State(state): State<ApiState>,
    Query(params): Query<AccumulationQuery>,
) -> Result<Json<Vec<AccumulationResult>>, AppError> {
    let signal = params
        .signal
        .as_deref()
        .map(str::parse::<Signal>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    Ok(Json(state.store.accumulation(signal, params.min_score)))
}

async fn get_accumulation_ticker(
    State(state): State<ApiState>,
    Path(ticker): Path<String>,
) -> Result<Json<AccumulationResult>, AppError> {
    state
        .store
        .accumulation_for(&ticker)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no accumulation result for {ticker}")))
}

async fn get_accumulation_history(
    State(state): State<ApiState>,
    Path(ticker): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<AccumulationRow>>, AppError> {
    let limit = params.limit.unwrap_or(30);

    let rows = sqlx::query_as::<_, AccumulationRow>(
        r#"
        SELECT scan_id, ticker, as_of, score, signal, action, confidence, risk,
               high_activity_days, current_price, price_change_pct,
               avg_relative_volume, avg_volume_efficiency, dark_pool_ratio,
               short_trend, dark_pool_bias, reasons
        FROM accumulation_results
        WHERE ticker = ?
        ORDER BY scan_id DESC
        LIMIT ?
        "#,
    )
    .bind(ticker.to_ascii_uppercase())
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

async fn get_distribution(
    State(state): State<ApiState>,
    Query(params): Query<DistributionQuery>,
) -> Json<Vec<DistributionResult>> {
    Json(state.store.distribution(params.min_score))
}

async fn get_distribution_history(
    State(state): State<ApiState>,
    Path(ticker): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<DistributionRow>>, AppError> {
    let limit = params.limit.unwrap_or(30);

    let rows = sqlx::query_as::<_, DistributionRow>(
        r#"
        SELECT scan_id, ticker, as_of, score, risk, action, current_price,
               price_change_pct, volume_trend, volume_price_correlation, reasons
        FROM distribution_results
        WHERE ticker = ?
        ORDER BY scan_id DESC
        LIMIT ?
        "#,
    )
    .bind(ticker.to_ascii_uppercase())
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

async fn get_sharks(
    State(state): State<ApiState>,
    Query(params): Query<SharksQuery>,
) -> Result<Json<Vec<SharkResult>>, AppError> {
    let category = params
        .category
        .as_deref()
        .map(str::parse::<SharkCategory>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    Ok(Json(state.store.sharks(category, params.silent_only.unwrap_or(false))))
}

async fn get_shark_history(
    State(state): State<ApiState>,
    Path(ticker): Path<String>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<SharkRow>>, AppError> {
    let limit = params.limit.unwrap_or(30);

    let rows = sqlx::query_as::<_, SharkRow>(
        r#"
        SELECT scan_id, ticker, volume_ratio, category, silent, score,
               avg_volume_7d, avg_volume_90d, avg_dollar_volume_90d, avg_price_90d,
               current_price, price_change_pct, price_change_30d_pct
        FROM shark_results
        WHERE ticker = ?
        ORDER BY scan_id DESC
        LIMIT ?
        "#,
    )
    .bind(ticker.to_ascii_uppercase())
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

async fn get_scans(
    State(state): State<ApiState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<ScanRunRow>>, AppError> {
    let limit = params.limit.unwrap_or(20);

    let rows = sqlx::query_as::<_, ScanRunRow>(
        r#"
        SELECT id, scanned_at, tickers, malformed, scored, insufficient_data,
               distribution_flagged, sharks, mega, big, regular, silent, rejected
        FROM scan_runs
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows))
}

async fn get_stats_summary(
    State(state): State<ApiState>,
) -> Result<Json<SummaryResponse>, AppError> {
    let summary = state
        .store
        .summary()
        .ok_or_else(|| AppError::NotFound("no scan has completed yet".to_string()))?;

    let mut top_accumulation = state.store.accumulation(None, None);
    top_accumulation.truncate(SUMMARY_TOP);
    let mut top_distribution = state.store.distribution(None);
    top_distribution.truncate(SUMMARY_TOP);
    let mut top_sharks = state.store.sharks(None, false);
    top_sharks.truncate(SUMMARY_TOP);

    Ok(Json(SummaryResponse {
        scanned_at_ns: state.store.scanned_at_ns(),
        summary,
        top_accumulation,
        top_distribution,
        top_sharks,
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    let (p50_us, p95_us, p99_us) = state.latency.percentiles();
    Json(LatencyResponse {
        samples: state.latency.len(),
        p50_us,
        p95_us,
        p99_us,
    })
}

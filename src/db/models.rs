//! Database row types matching the tables in `migrations/`.
//! Read back by the history endpoints.

use serde::Serialize;

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ScanRunRow {
    pub id: i64,
    pub scanned_at: i64,
    pub tickers: i64,
    pub malformed: i64,
    pub scored: i64,
    pub insufficient_data: i64,
    pub distribution_flagged: i64,
    pub sharks: i64,
    pub mega: i64,
    pub big: i64,
    pub regular: i64,
    pub silent: i64,
    pub rejected: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AccumulationRow {
    pub scan_id: i64,
    pub ticker: String,
    pub as_of: String,
    pub score: f64,
    pub signal: String,
    pub action: String,
    pub confidence: String,
    pub risk: String,
    pub high_activity_days: i64,
    pub current_price: f64,
    pub price_change_pct: f64,
    pub avg_relative_volume: Option<f64>,
    pub avg_volume_efficiency: Option<f64>,
    pub dark_pool_ratio: f64,
    pub short_trend: String,
    pub dark_pool_bias: Option<String>,
    pub reasons: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct DistributionRow {
    pub scan_id: i64,
    pub ticker: String,
    pub as_of: String,
    pub score: f64,
    pub risk: String,
    pub action: String,
    pub current_price: f64,
    pub price_change_pct: f64,
    pub volume_trend: Option<f64>,
    pub volume_price_correlation: Option<f64>,
    pub reasons: String,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct SharkRow {
    pub scan_id: i64,
    pub ticker: String,
    pub volume_ratio: f64,
    pub category: String,
    pub silent: bool,
    pub score: f64,
    pub avg_volume_7d: f64,
    pub avg_volume_90d: f64,
    pub avg_dollar_volume_90d: f64,
    pub avg_price_90d: f64,
    pub current_price: f64,
    pub price_change_pct: f64,
    pub price_change_30d_pct: Option<f64>,
}

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::api::health::HealthState;
use crate::error::Result;
use crate::scan::aggregator::ScanReport;
use crate::types::{AccumulationResult, DistributionResult, SharkResult};

/// Receives finished scan reports from the scheduler and persists them to
/// SQLite. Runs as a dedicated background task so a slow disk never delays
/// the next scan.
pub struct DbWriter {
    pool: sqlx::SqlitePool,
    report_rx: mpsc::Receiver<Arc<ScanReport>>,
    health: Arc<HealthState>,
}

impl DbWriter {
    pub fn new(
        pool: sqlx::SqlitePool,
        report_rx: mpsc::Receiver<Arc<ScanReport>>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            pool,
            report_rx,
            health,
        }
    }

    pub async fn run(mut self) {
        while let Some(report) = self.report_rx.recv().await {
            match write_report(&self.pool, &report).await {
                Ok(scan_id) => debug!(
                    scan_id,
                    accumulation = report.accumulation.len(),
                    distribution = report.distribution.len(),
                    sharks = report.sharks.len(),
                    "[DB] scan persisted"
                ),
                Err(e) => error!("[DB] write error: {e}"),
            }
            self.health.dec_write_queue_pending();
        }
    }
}

/// Writes one scan run and all of its results in a single transaction.
/// Returns the new `scan_runs.id`.
pub async fn write_report(pool: &sqlx::SqlitePool, report: &ScanReport) -> Result<i64> {
    let summary = &report.summary;
    let rejected = serde_json::to_string(&summary.sharks.rejected)?;

    let mut tx = pool.begin().await?;

    let scan_id = sqlx::query(
        r#"
        INSERT INTO scan_runs (
            scanned_at, tickers, malformed, scored, insufficient_data,
            distribution_flagged, sharks, mega, big, regular, silent, rejected
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.scanned_at_ns as i64)
    .bind(summary.tickers as i64)
    .bind(summary.malformed as i64)
    .bind(summary.accumulation.scored as i64)
    .bind(summary.accumulation.insufficient_data as i64)
    .bind(summary.distribution.flagged as i64)
    .bind(summary.sharks.total as i64)
    .bind(summary.sharks.mega as i64)
    .bind(summary.sharks.big as i64)
    .bind(summary.sharks.regular as i64)
    .bind(summary.sharks.silent as i64)
    .bind(rejected)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for r in &report.accumulation {
        insert_accumulation(&mut tx, scan_id, r).await?;
    }
    for d in &report.distribution {
        insert_distribution(&mut tx, scan_id, d).await?;
    }
    for s in &report.sharks {
        insert_shark(&mut tx, scan_id, s).await?;
    }

    tx.commit().await?;
    Ok(scan_id)
}

async fn insert_accumulation(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    scan_id: i64,
    r: &AccumulationResult,
) -> Result<()> {
    let reasons = serde_json::to_string(&r.reasons)?;

    sqlx::query(
        r#"
        INSERT INTO accumulation_results (
            scan_id, ticker, as_of, score, signal, action, confidence, risk,
            high_activity_days, current_price, price_change_pct,
            avg_relative_volume, avg_volume_efficiency, dark_pool_ratio,
            short_trend, dark_pool_bias, reasons
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(scan_id)
    .bind(&r.ticker)
    .bind(r.date.to_string())
    .bind(r.score)
    .bind(r.signal.to_string())
    .bind(r.action.to_string())
    .bind(r.confidence.to_string())
    .bind(r.risk.to_string())
    .bind(r.high_activity_days as i64)
    .bind(r.current_price)
    .bind(r.price_change_pct)
    .bind(r.avg_relative_volume)
    .bind(r.avg_volume_efficiency)
    .bind(r.dark_pool_ratio)
    .bind(r.short_trend.to_string())
    .bind(r.dark_pool_bias.map(|b| b.to_string()))
    .bind(reasons)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_distribution(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    scan_id: i64,
    d: &DistributionResult,
) -> Result<()> {
    let reasons = serde_json::to_string(&d.reasons)?;

    sqlx::query(
        r#"
        INSERT INTO distribution_results (
            scan_id, ticker, as_of, score, risk, action, current_price,
            price_change_pct, volume_trend, volume_price_correlation, reasons
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(scan_id)
    .bind(&d.ticker)
    .bind(d.date.to_string())
    .bind(d.score)
    .bind(d.risk.to_string())
    .bind(d.action.to_string())
    .bind(d.current_price)
    .bind(d.price_change_pct)
    .bind(d.volume_trend)
    .bind(d.volume_price_correlation)
    .bind(reasons)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_shark(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    scan_id: i64,
    s: &SharkResult,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO shark_results (
            scan_id, ticker, volume_ratio, category, silent, score,
            avg_volume_7d, avg_volume_90d, avg_dollar_volume_90d, avg_price_90d,
            current_price, price_change_pct, price_change_30d_pct
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(scan_id)
    .bind(&s.ticker)
    .bind(s.volume_ratio)
    .bind(s.category.to_string())
    .bind(s.silent)
    .bind(s.score)
    .bind(s.avg_volume_7d)
    .bind(s.avg_volume_90d)
    .bind(s.avg_dollar_volume_90d)
    .bind(s.avg_price_90d)
    .bind(s.current_price)
    .bind(s.price_change_pct)
    .bind(s.price_change_30d_pct)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

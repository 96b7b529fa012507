use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::config::{AccumulationConfig, Config, SharkConfig};
use crate::error::Result;
use crate::loader::load_series_dir;
use crate::scan::aggregator::{run_scan_parallel, ScanReport};
use crate::state::ResultStore;

/// Background task that rescans the data directory on a fixed interval,
/// publishes the report to the result store and queues it for persistence.
pub struct ScanScheduler {
    data_dir: PathBuf,
    interval: Duration,
    top_n: usize,
    accumulation: AccumulationConfig,
    shark: SharkConfig,
    store: Arc<ResultStore>,
    health: Arc<HealthState>,
    latency: Arc<LatencyStats>,
    report_tx: mpsc::Sender<Arc<ScanReport>>,
}

impl ScanScheduler {
    pub fn new(
        cfg: &Config,
        store: Arc<ResultStore>,
        health: Arc<HealthState>,
        latency: Arc<LatencyStats>,
        report_tx: mpsc::Sender<Arc<ScanReport>>,
    ) -> Self {
        Self {
            data_dir: PathBuf::from(&cfg.data_dir),
            interval: Duration::from_secs(cfg.scan_interval_secs.max(1)),
            top_n: cfg.top_n,
            accumulation: cfg.accumulation.clone(),
            shark: cfg.shark.clone(),
            store,
            health,
            latency,
            report_tx,
        }
    }

    /// Scans immediately, then once per interval.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.health.set_scan_running(true);
            let outcome = self.scan_once().await;
            self.health.set_scan_running(false);

            if let Err(e) = outcome {
                error!("[SCAN] scan failed: {e}");
            }
        }
    }

    pub async fn scan_once(&self) -> Result<Arc<ScanReport>> {
        let (series, load_stats) = load_series_dir(&self.data_dir).await?;
        info!(
            "[LOADER] {} series loaded from {} ({} files, parse_errors={} empty={} duplicate={} unreadable={})",
            load_stats.loaded,
            self.data_dir.display(),
            load_stats.files_seen,
            load_stats.rejected_parse,
            load_stats.rejected_empty,
            load_stats.rejected_duplicate,
            load_stats.rejected_unreadable,
        );

        let report = run_scan_parallel(
            now_ns(),
            Arc::new(series),
            self.accumulation.clone(),
            self.shark.clone(),
            Arc::clone(&self.latency),
        )
        .await?;
        let report = Arc::new(report);

        self.store.replace(&report);
        self.health
            .record_scan(report.scanned_at_ns, report.summary.tickers as u64);

        self.health.inc_write_queue_pending();
        if let Err(e) = self.report_tx.try_send(Arc::clone(&report)) {
            self.health.dec_write_queue_pending();
            warn!("[DB] writer channel full, scan not persisted: {e}");
        }

        log_summary(&report, self.top_n);
        Ok(report)
    }
}

fn log_summary(report: &ScanReport, top_n: usize) {
    let s = &report.summary;
    let acc = &s.accumulation;
    info!(
        tickers = s.tickers,
        malformed = s.malformed,
        scored = acc.scored,
        "[SCAN] accumulation | strong: {} | accumulation: {} | neutral: {} | weak_distribution: {} | distribution: {} | insufficient: {}",
        acc.strong_accumulation, acc.accumulation, acc.neutral, acc.weak_distribution, acc.distribution, acc.insufficient_data,
    );

    info!(
        "[SCAN] distribution | flagged: {} | high: {} | medium: {} | low: {}",
        s.distribution.flagged, s.distribution.high, s.distribution.medium, s.distribution.low,
    );

    let rejected = s
        .sharks
        .rejected
        .iter()
        .map(|(reason, n)| format!("{reason}={n}"))
        .collect::<Vec<_>>()
        .join(" ");
    info!(
        "[SHARK] qualified: {} | mega: {} | big: {} | regular: {} | silent: {} | rejected: {}",
        s.sharks.total, s.sharks.mega, s.sharks.big, s.sharks.regular, s.sharks.silent, rejected,
    );

    for (rank, r) in report.accumulation.iter().take(top_n).enumerate() {
        info!(
            ticker = %r.ticker,
            score = r.score,
            signal = %r.signal,
            "[SCAN] #{:<2} {:<6} {:>4.1}/10 {} | {} | dp: {:.1}% | rv: {}",
            rank + 1,
            r.ticker,
            r.score,
            r.signal,
            r.action,
            r.dark_pool_ratio,
            r.avg_relative_volume
                .map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}x")),
        );
    }

    for d in report.distribution.iter().take(top_n) {
        info!(
            ticker = %d.ticker,
            risk = %d.risk,
            "[SCAN] distribution {:<6} {:.0} pts {} | {:+.1}% | {}",
            d.ticker,
            d.score,
            d.action,
            d.price_change_pct,
            d.reasons.join("; "),
        );
    }

    for (rank, sh) in report.sharks.iter().take(top_n).enumerate() {
        let silent = if sh.silent { " SILENT" } else { "" };
        info!(
            ticker = %sh.ticker,
            category = %sh.category,
            "[SHARK] #{:<2} {:<6} {} {:.2}x | 7d: {:+.1}% | ${:.2}{}",
            rank + 1,
            sh.ticker,
            sh.category,
            sh.volume_ratio,
            sh.price_change_pct,
            sh.current_price,
            silent,
        );
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

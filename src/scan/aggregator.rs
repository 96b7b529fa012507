use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::try_join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::api::latency::LatencyStats;
use crate::config::{AccumulationConfig, SharkConfig};
use crate::detector::scan_series;
use crate::error::{Result, SeriesError};
use crate::scorer::{evaluate, evaluate_distribution};
use crate::types::{
    AccumulationResult, DistributionResult, ExclusionReason, Risk, SharkCategory, SharkOutcome,
    SharkResult, Signal, TickerSeries,
};

/// Tickers handed to each blocking worker.
const CHUNK_SIZE: usize = 64;

/// Per-ticker evaluation. Both engines run off the same validated series.
#[derive(Debug, Clone, PartialEq)]
pub enum TickerOutcome {
    Malformed(SeriesError),
    Evaluated {
        /// None when the series is too short to score.
        accumulation: Option<AccumulationResult>,
        /// None when no distribution rule fires or the series was not scored.
        distribution: Option<DistributionResult>,
        shark: SharkOutcome,
    },
}

pub fn evaluate_ticker(
    series: &TickerSeries,
    acc_cfg: &AccumulationConfig,
    shark_cfg: &SharkConfig,
) -> TickerOutcome {
    let accumulation = match evaluate(&series.ticker, &series.bars, acc_cfg) {
        Ok(result) => result,
        Err(e) => return TickerOutcome::Malformed(e),
    };
    let distribution = accumulation
        .as_ref()
        .and_then(|acc| evaluate_distribution(acc, &series.bars, acc_cfg.eval_window));
    TickerOutcome::Evaluated {
        accumulation,
        distribution,
        shark: scan_series(&series.meta(), &series.bars, shark_cfg),
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccumulationSummary {
    pub scored: usize,
    pub insufficient_data: usize,
    pub strong_accumulation: usize,
    pub accumulation: usize,
    pub neutral: usize,
    pub weak_distribution: usize,
    pub distribution: usize,
}

impl AccumulationSummary {
    fn count(&mut self, signal: Signal) {
        self.scored += 1;
        let slot = match signal {
            Signal::StrongAccumulation => &mut self.strong_accumulation,
            Signal::Accumulation => &mut self.accumulation,
            Signal::Neutral => &mut self.neutral,
            Signal::WeakDistribution => &mut self.weak_distribution,
            Signal::Distribution => &mut self.distribution,
        };
        *slot += 1;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub flagged: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl DistributionSummary {
    fn count(&mut self, risk: Risk) {
        self.flagged += 1;
        match risk {
            Risk::High => self.high += 1,
            Risk::Medium => self.medium += 1,
            Risk::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SharkSummary {
    pub total: usize,
    pub mega: usize,
    pub big: usize,
    pub regular: usize,
    pub silent: usize,
    pub rejected: BTreeMap<ExclusionReason, usize>,
}

impl SharkSummary {
    fn count(&mut self, shark: &SharkResult) {
        self.total += 1;
        match shark.category {
            SharkCategory::Mega => self.mega += 1,
            SharkCategory::Big => self.big += 1,
            SharkCategory::Regular => self.regular += 1,
        }
        if shark.silent {
            self.silent += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub tickers: usize,
    pub malformed: usize,
    pub accumulation: AccumulationSummary,
    pub distribution: DistributionSummary,
    pub sharks: SharkSummary,
}

/// Ranked output of one scan over the watchlist.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub scanned_at_ns: u64,
    pub accumulation: Vec<AccumulationResult>,
    pub distribution: Vec<DistributionResult>,
    pub sharks: Vec<SharkResult>,
    pub summary: ScanSummary,
}

impl ScanReport {
    /// Folds per-ticker outcomes into a ranked report. The result does not
    /// depend on the order outcomes arrive in.
    pub fn from_outcomes(
        scanned_at_ns: u64,
        outcomes: impl IntoIterator<Item = (String, TickerOutcome)>,
    ) -> Self {
        let mut report = ScanReport {
            scanned_at_ns,
            ..Default::default()
        };

        for (ticker, outcome) in outcomes {
            report.summary.tickers += 1;
            match outcome {
                TickerOutcome::Malformed(e) => {
                    warn!(ticker = %ticker, "[SCAN] skipping malformed series: {e}");
                    report.summary.malformed += 1;
                }
                TickerOutcome::Evaluated {
                    accumulation,
                    distribution,
                    shark,
                } => {
                    match accumulation {
                        Some(result) => {
                            report.summary.accumulation.count(result.signal);
                            report.accumulation.push(result);
                        }
                        None => {
                            debug!(ticker = %ticker, "[SCAN] not enough bars to score");
                            report.summary.accumulation.insufficient_data += 1;
                        }
                    }
                    if let Some(result) = distribution {
                        report.summary.distribution.count(result.risk);
                        report.distribution.push(result);
                    }
                    match shark {
                        SharkOutcome::Shark(result) => {
                            report.summary.sharks.count(&result);
                            report.sharks.push(result);
                        }
                        SharkOutcome::Excluded(reason) => {
                            debug!(ticker = %ticker, reason = %reason, "[SHARK] excluded");
                            *report.summary.sharks.rejected.entry(reason).or_default() += 1;
                        }
                    }
                }
            }
        }

        rank_accumulation(&mut report.accumulation);
        rank_distribution(&mut report.distribution);
        rank_sharks(&mut report.sharks);
        report
    }
}

/// Score descending, then average relative volume descending, then ticker.
pub fn rank_accumulation(results: &mut [AccumulationResult]) {
    results.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| {
                let (ra, rb) = (
                    a.avg_relative_volume.unwrap_or(f64::NEG_INFINITY),
                    b.avg_relative_volume.unwrap_or(f64::NEG_INFINITY),
                );
                rb.total_cmp(&ra)
            })
            .then_with(|| a.ticker.cmp(&b.ticker))
    });
}

/// Distribution score descending, then ticker.
pub fn rank_distribution(results: &mut [DistributionResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.ticker.cmp(&b.ticker)));
}

/// Shark score descending, then ticker.
pub fn rank_sharks(results: &mut [SharkResult]) {
    results.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.ticker.cmp(&b.ticker),
        other => other,
    });
}

// ---------------------------------------------------------------------------
// Drivers
// ---------------------------------------------------------------------------

/// Evaluates tickers in chunks on the blocking pool. Each ticker is
/// independent, so workers share nothing but read-only config.
pub async fn run_scan_parallel(
    scanned_at_ns: u64,
    series: Arc<Vec<TickerSeries>>,
    acc_cfg: AccumulationConfig,
    shark_cfg: SharkConfig,
    latency: Arc<LatencyStats>,
) -> Result<ScanReport> {
    let acc_cfg = Arc::new(acc_cfg);
    let shark_cfg = Arc::new(shark_cfg);

    let tasks = (0..series.len()).step_by(CHUNK_SIZE).map(|start| {
        let series = Arc::clone(&series);
        let acc_cfg = Arc::clone(&acc_cfg);
        let shark_cfg = Arc::clone(&shark_cfg);
        let latency = Arc::clone(&latency);
        tokio::task::spawn_blocking(move || {
            let end = (start + CHUNK_SIZE).min(series.len());
            series[start..end]
                .iter()
                .map(|s| {
                    let started = Instant::now();
                    let outcome = evaluate_ticker(s, &acc_cfg, &shark_cfg);
                    latency.record(started.elapsed());
                    (s.ticker.clone(), outcome)
                })
                .collect::<Vec<_>>()
        })
    });

    let chunks = try_join_all(tasks).await?;
    Ok(ScanReport::from_outcomes(scanned_at_ns, chunks.into_iter().flatten()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DailyBar;
    use chrono::{Duration, NaiveDate};

    fn run_scan(
        scanned_at_ns: u64,
        series: &[TickerSeries],
        acc_cfg: &AccumulationConfig,
        shark_cfg: &SharkConfig,
    ) -> ScanReport {
        ScanReport::from_outcomes(
            scanned_at_ns,
            series
                .iter()
                .map(|s| (s.ticker.clone(), evaluate_ticker(s, acc_cfg, shark_cfg))),
        )
    }

    /// `n` bars, the last `tail` at `loud_volume`, close drifting by `drift` per bar.
    fn series(ticker: &str, n: usize, tail: usize, loud_volume: f64, drift: f64) -> TickerSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| {
                let loud = i >= n - tail;
                let volume = if loud { loud_volume } else { 500_000.0 };
                let short_share = if loud { 0.4 } else { 0.3 };
                DailyBar {
                    date: start + Duration::days(i as i64),
                    close: 50.0 + drift * i as f64,
                    volume,
                    short_volume: Some(volume * short_share),
                    total_volume: None,
                    short_exempt_volume: None,
                }
            })
            .collect();
        TickerSeries {
            ticker: ticker.to_string(),
            name: None,
            bars,
        }
    }

    fn watchlist() -> Vec<TickerSeries> {
        let mut malformed = series("BAD", 120, 7, 500_000.0, 0.0);
        malformed.bars.swap(10, 11);
        vec![
            series("QUIET", 120, 0, 0.0, 0.0),
            series("MEGA", 120, 7, 1_600_000.0, 0.01),
            series("BIG", 120, 7, 1_100_000.0, 0.01),
            series("THIN", 15, 0, 0.0, 0.0),
            malformed,
        ]
    }

    /// Close falls 2% on heavy days and 0.5% on light ones.
    fn selloff(ticker: &str, n: usize) -> TickerSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut close = 80.0;
        let bars = (0..n)
            .map(|i| {
                let heavy = i % 2 == 1;
                close *= if heavy { 0.98 } else { 0.995 };
                DailyBar {
                    date: start + Duration::days(i as i64),
                    close,
                    volume: if heavy { 3_000_000.0 } else { 1_500_000.0 },
                    short_volume: None,
                    total_volume: None,
                    short_exempt_volume: None,
                }
            })
            .collect();
        TickerSeries {
            ticker: ticker.to_string(),
            name: None,
            bars,
        }
    }

    #[test]
    fn report_counts_and_ranks() {
        let report = run_scan(
            1,
            &watchlist(),
            &AccumulationConfig::default(),
            &SharkConfig::default(),
        );

        assert_eq!(report.summary.tickers, 5);
        assert_eq!(report.summary.malformed, 1);
        assert_eq!(report.summary.accumulation.insufficient_data, 1);
        assert_eq!(report.summary.accumulation.scored, 3);

        let tickers: Vec<&str> = report.sharks.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["MEGA", "BIG"]);
        assert_eq!(report.summary.sharks.mega, 1);
        assert_eq!(report.summary.sharks.big, 1);
        assert_eq!(report.summary.sharks.silent, 2);
        assert_eq!(
            report.summary.sharks.rejected.get(&ExclusionReason::LowVolumeRatio),
            Some(&1)
        );
        assert_eq!(
            report.summary.sharks.rejected.get(&ExclusionReason::InsufficientHistory),
            Some(&1)
        );

        // Ranked by score descending
        assert!(report
            .accumulation
            .windows(2)
            .all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn ranking_breaks_ties_by_volume_then_ticker() {
        let report = run_scan(
            1,
            &watchlist(),
            &AccumulationConfig::default(),
            &SharkConfig::default(),
        );
        let mut results = report.accumulation.clone();
        for r in &mut results {
            r.score = 5.0;
            r.avg_relative_volume = Some(1.0);
        }
        results.reverse();
        rank_accumulation(&mut results);
        let tickers: Vec<&str> = results.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["BIG", "MEGA", "QUIET"]);
    }

    #[test]
    fn distribution_flags_are_counted_and_ranked() {
        let mut list = watchlist();
        list.push(selloff("DUMP", 120));
        list.push(selloff("SLIDE", 120));
        let report = run_scan(1, &list, &AccumulationConfig::default(), &SharkConfig::default());

        let flagged: Vec<&str> = report.distribution.iter().map(|d| d.ticker.as_str()).collect();
        assert!(flagged.contains(&"DUMP"));
        assert!(flagged.contains(&"SLIDE"));
        assert!(!flagged.contains(&"BAD"));
        assert!(!flagged.contains(&"THIN"));
        assert!(report
            .distribution
            .windows(2)
            .all(|w| w[0].score > w[1].score || (w[0].score == w[1].score && w[0].ticker < w[1].ticker)));

        let d = &report.summary.distribution;
        assert_eq!(d.flagged, report.distribution.len());
        assert_eq!(d.high + d.medium + d.low, d.flagged);
        assert!(d.high >= 2);
    }

    #[tokio::test]
    async fn parallel_scan_matches_sequential() {
        let list = watchlist();
        let sequential = run_scan(7, &list, &AccumulationConfig::default(), &SharkConfig::default());

        let latency = Arc::new(LatencyStats::new());
        let parallel = run_scan_parallel(
            7,
            Arc::new(list),
            AccumulationConfig::default(),
            SharkConfig::default(),
            Arc::clone(&latency),
        )
        .await
        .unwrap();

        assert_eq!(parallel, sequential);
        assert_eq!(latency.len(), 5);
    }

    #[tokio::test]
    async fn empty_watchlist_yields_empty_report() {
        let report = run_scan_parallel(
            0,
            Arc::new(Vec::new()),
            AccumulationConfig::default(),
            SharkConfig::default(),
            Arc::new(LatencyStats::new()),
        )
        .await
        .unwrap();
        assert_eq!(report.summary.tickers, 0);
        assert!(report.accumulation.is_empty());
        assert!(report.sharks.is_empty());
    }
}

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use crate::scan::aggregator::{
    rank_accumulation, rank_distribution, rank_sharks, ScanReport, ScanSummary,
};
use crate::types::{AccumulationResult, DistributionResult, SharkCategory, SharkResult, Signal};

/// Latest scan results keyed by ticker. Written once per scan by the
/// scheduler, read concurrently by the API handlers.
pub struct ResultStore {
    /// ticker → latest accumulation result
    accumulation: DashMap<String, AccumulationResult>,
    /// ticker → latest distribution flag
    distribution: DashMap<String, DistributionResult>,
    /// ticker → latest shark result (only tickers that passed every gate)
    sharks: DashMap<String, SharkResult>,
    summary: RwLock<Option<ScanSummary>>,
    scanned_at_ns: AtomicU64,
}

impl ResultStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Swaps in a fresh report. Tickers absent from the new report are dropped.
    pub fn replace(&self, report: &ScanReport) {
        let fresh: HashSet<&str> = report.accumulation.iter().map(|r| r.ticker.as_str()).collect();
        self.accumulation.retain(|ticker, _| fresh.contains(ticker.as_str()));
        for r in &report.accumulation {
            self.accumulation.insert(r.ticker.clone(), r.clone());
        }

        let fresh: HashSet<&str> = report.distribution.iter().map(|d| d.ticker.as_str()).collect();
        self.distribution.retain(|ticker, _| fresh.contains(ticker.as_str()));
        for d in &report.distribution {
            self.distribution.insert(d.ticker.clone(), d.clone());
        }

        let fresh: HashSet<&str> = report.sharks.iter().map(|s| s.ticker.as_str()).collect();
        self.sharks.retain(|ticker, _| fresh.contains(ticker.as_str()));
        for s in &report.sharks {
            self.sharks.insert(s.ticker.clone(), s.clone());
        }

        if let Ok(mut summary) = self.summary.write() {
            *summary = Some(report.summary.clone());
        }
        self.scanned_at_ns.store(report.scanned_at_ns, Ordering::Relaxed);
    }

    /// Ranked accumulation results, optionally filtered by signal and minimum score.
    pub fn accumulation(&self, signal: Option<Signal>, min_score: Option<f64>) -> Vec<AccumulationResult> {
        let mut results: Vec<AccumulationResult> = self
            .accumulation
            .iter()
            .filter(|e| signal.map_or(true, |s| e.signal == s))
            .filter(|e| min_score.map_or(true, |m| e.score >= m))
            .map(|e| e.value().clone())
            .collect();
        rank_accumulation(&mut results);
        results
    }

    pub fn accumulation_for(&self, ticker: &str) -> Option<AccumulationResult> {
        self.accumulation
            .get(&ticker.to_ascii_uppercase())
            .map(|r| r.clone())
    }

    /// Ranked distribution flags at or above `min_score`.
    pub fn distribution(&self, min_score: Option<f64>) -> Vec<DistributionResult> {
        let mut results: Vec<DistributionResult> = self
            .distribution
            .iter()
            .filter(|e| min_score.map_or(true, |m| e.score >= m))
            .map(|e| e.value().clone())
            .collect();
        rank_distribution(&mut results);
        results
    }

    /// Ranked shark results, optionally filtered by tier and the silent flag.
    pub fn sharks(&self, category: Option<SharkCategory>, silent_only: bool) -> Vec<SharkResult> {
        let mut results: Vec<SharkResult> = self
            .sharks
            .iter()
            .filter(|e| category.map_or(true, |c| e.category == c))
            .filter(|e| !silent_only || e.silent)
            .map(|e| e.value().clone())
            .collect();
        rank_sharks(&mut results);
        results
    }

    /// Summary of the last scan. None until the first scan completes.
    pub fn summary(&self) -> Option<ScanSummary> {
        self.summary.read().ok().and_then(|s| s.clone())
    }

    pub fn scanned_at_ns(&self) -> u64 {
        self.scanned_at_ns.load(Ordering::Relaxed)
    }

    pub fn accumulation_count(&self) -> usize {
        self.accumulation.len()
    }

    pub fn distribution_count(&self) -> usize {
        self.distribution.len()
    }

    pub fn shark_count(&self) -> usize {
        self.sharks.len()
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self {
            accumulation: DashMap::new(),
            distribution: DashMap::new(),
            sharks: DashMap::new(),
            summary: RwLock::new(None),
            scanned_at_ns: AtomicU64::new(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistributionAction, Risk, ShortTrend};
    use chrono::NaiveDate;

    fn acc(ticker: &str, score: f64, signal: Signal) -> AccumulationResult {
        AccumulationResult {
            ticker: ticker.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            score,
            signal,
            action: signal.action(),
            confidence: signal.confidence(),
            risk: signal.confidence().risk(),
            reasons: vec![format!("accumulation score {score:.1}/10")],
            high_activity_days: 0,
            current_price: 25.0,
            price_change_pct: 0.5,
            avg_relative_volume: Some(1.2),
            avg_volume_efficiency: Some(0.4),
            dark_pool_ratio: 38.0,
            short_trend: ShortTrend::Stable,
            dark_pool_bias: None,
        }
    }

    fn shark(ticker: &str, ratio: f64, category: SharkCategory, silent: bool) -> SharkResult {
        SharkResult {
            ticker: ticker.to_string(),
            volume_ratio: ratio,
            category,
            silent,
            score: ratio,
            avg_volume_7d: ratio * 1_000_000.0,
            avg_volume_90d: 1_000_000.0,
            avg_dollar_volume_90d: 20_000_000.0,
            avg_price_90d: 20.0,
            current_price: 20.0,
            price_change_pct: 0.0,
            price_change_30d_pct: None,
        }
    }

    fn report(at: u64, accumulation: Vec<AccumulationResult>, sharks: Vec<SharkResult>) -> ScanReport {
        ScanReport {
            scanned_at_ns: at,
            accumulation,
            distribution: vec![],
            sharks,
            summary: ScanSummary::default(),
        }
    }

    #[test]
    fn filters_and_ranks_accumulation() {
        let store = ResultStore::new();
        store.replace(&report(
            1,
            vec![
                acc("AMD", 5.0, Signal::Accumulation),
                acc("NVDA", 8.0, Signal::StrongAccumulation),
                acc("INTC", 1.0, Signal::Neutral),
            ],
            vec![],
        ));

        let all: Vec<String> = store.accumulation(None, None).into_iter().map(|r| r.ticker).collect();
        assert_eq!(all, vec!["NVDA", "AMD", "INTC"]);

        let strong = store.accumulation(Some(Signal::StrongAccumulation), None);
        assert_eq!(strong.len(), 1);
        assert_eq!(strong[0].ticker, "NVDA");

        assert_eq!(store.accumulation(None, Some(4.0)).len(), 2);
        assert_eq!(store.accumulation_for("amd").map(|r| r.score), Some(5.0));
        assert!(store.accumulation_for("TSLA").is_none());
    }

    #[test]
    fn replace_drops_stale_tickers() {
        let store = ResultStore::new();
        store.replace(&report(
            1,
            vec![acc("AMD", 5.0, Signal::Accumulation)],
            vec![shark("AMD", 2.5, SharkCategory::Big, true)],
        ));
        store.replace(&report(2, vec![acc("NVDA", 4.0, Signal::Accumulation)], vec![]));

        assert_eq!(store.accumulation_count(), 1);
        assert!(store.accumulation_for("AMD").is_none());
        assert_eq!(store.shark_count(), 0);
        assert_eq!(store.scanned_at_ns(), 2);
        assert!(store.summary().is_some());
    }

    #[test]
    fn replace_keeps_overlapping_tickers_across_large_scans() {
        let store = ResultStore::new();
        let first: Vec<AccumulationResult> = (0..2_000)
            .map(|i| acc(&format!("T{i:04}"), 1.0, Signal::Neutral))
            .collect();
        store.replace(&report(1, first, vec![]));

        let second: Vec<AccumulationResult> = (1_000..3_000)
            .map(|i| acc(&format!("T{i:04}"), 5.0, Signal::Accumulation))
            .collect();
        store.replace(&report(2, second, vec![]));

        assert_eq!(store.accumulation_count(), 2_000);
        assert!(store.accumulation_for("T0999").is_none());
        assert_eq!(store.accumulation_for("T1000").map(|r| r.score), Some(5.0));
        assert_eq!(store.accumulation_for("T2999").map(|r| r.score), Some(5.0));
    }

    #[test]
    fn filters_sharks_by_category_and_silence() {
        let store = ResultStore::new();
        store.replace(&report(
            1,
            vec![],
            vec![
                shark("LOUD", 3.4, SharkCategory::Mega, false),
                shark("QUIET", 3.1, SharkCategory::Mega, true),
                shark("MID", 2.2, SharkCategory::Big, true),
            ],
        ));

        let all: Vec<String> = store.sharks(None, false).into_iter().map(|s| s.ticker).collect();
        assert_eq!(all, vec!["LOUD", "QUIET", "MID"]);
        assert_eq!(store.sharks(Some(SharkCategory::Mega), false).len(), 2);
        let silent_mega = store.sharks(Some(SharkCategory::Mega), true);
        assert_eq!(silent_mega.len(), 1);
        assert_eq!(silent_mega[0].ticker, "QUIET");
    }

    #[test]
    fn distribution_filters_by_score_and_drops_stale() {
        let flag = |ticker: &str, score: f64| DistributionResult {
            ticker: ticker.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            score,
            risk: Risk::Medium,
            action: DistributionAction::WatchReduce,
            reasons: vec![],
            current_price: 30.0,
            price_change_pct: -6.0,
            volume_trend: Some(1.3),
            volume_price_correlation: Some(0.65),
        };
        let store = ResultStore::new();
        let mut first = report(1, vec![], vec![]);
        first.distribution = vec![flag("AAA", 3.0), flag("BBB", 5.0), flag("CCC", 3.0)];
        store.replace(&first);

        let all: Vec<String> = store.distribution(None).into_iter().map(|d| d.ticker).collect();
        assert_eq!(all, vec!["BBB", "AAA", "CCC"]);
        assert_eq!(store.distribution(Some(4.0)).len(), 1);

        let mut second = report(2, vec![], vec![]);
        second.distribution = vec![flag("CCC", 1.0)];
        store.replace(&second);
        assert_eq!(store.distribution_count(), 1);
        assert_eq!(store.distribution(None)[0].score, 1.0);
    }

    #[test]
    fn empty_store_has_no_summary() {
        let store = ResultStore::new();
        assert!(store.summary().is_none());
        assert!(store.accumulation(None, None).is_empty());
        assert_eq!(store.scanned_at_ns(), 0);
    }
}

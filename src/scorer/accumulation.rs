use chrono::NaiveDate;

use crate::config::{overlay_thresholds, score_thresholds, AccumulationConfig, MAX_SCORE};
use crate::error::SeriesError;
use crate::metrics::builder::{build_metrics, mean_defined, short_trend};
use crate::types::{
    validate_series, AccumulationResult, DailyBar, DarkPoolBias, MetricRow, ShortTrend, Signal,
};

// ---------------------------------------------------------------------------
// Window aggregates
// ---------------------------------------------------------------------------

/// Aggregate statistics over the trailing evaluation window. Undefined
/// per-day metrics are left out of every mean.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub avg_relative_volume: Option<f64>,
    pub avg_volume_efficiency: Option<f64>,
    /// None when no day in the window has FINRA coverage.
    pub avg_dark_pool_ratio: Option<f64>,
    pub avg_price_change_pct: Option<f64>,
    pub short_trend: ShortTrend,
    pub high_activity_days: usize,
}

impl WindowStats {
    pub fn from_rows(rows: &[MetricRow], cfg: &AccumulationConfig) -> Self {
        let column = |f: fn(&MetricRow) -> Option<f64>| rows.iter().map(f).collect::<Vec<_>>();
        let dark_pool = column(|r| r.dark_pool_ratio);

        Self {
            avg_relative_volume: mean_defined(&column(|r| r.relative_volume)),
            avg_volume_efficiency: mean_defined(&column(|r| r.volume_efficiency)),
            avg_dark_pool_ratio: mean_defined(&dark_pool),
            avg_price_change_pct: mean_defined(&column(|r| r.price_change_pct)),
            short_trend: short_trend(&dark_pool, cfg.short_trend_tolerance),
            high_activity_days: rows.iter().filter(|r| r.high_activity).count(),
        }
    }

    /// Dark-pool ratio as reported: 0 without FINRA coverage.
    pub fn dark_pool_ratio(&self) -> f64 {
        self.avg_dark_pool_ratio.unwrap_or(0.0)
    }
}

// ---------------------------------------------------------------------------
// Scoring rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    AboveAverageVolume,
    LowEfficiency,
    HighDarkPool,
    VeryHighVolume,
    FlatPrice,
}

/// A named predicate worth a fixed number of points. Rules are independent,
/// so the total does not depend on evaluation order.
pub struct ScoreRule {
    pub kind: RuleKind,
    pub points: f64,
    applies: fn(&WindowStats, &AccumulationConfig) -> bool,
}

impl ScoreRule {
    pub fn applies(&self, stats: &WindowStats, cfg: &AccumulationConfig) -> bool {
        (self.applies)(stats, cfg)
    }
}

pub const RULES: [ScoreRule; 5] = [
    ScoreRule {
        kind: RuleKind::AboveAverageVolume,
        points: 2.0,
        applies: |s, c| s.avg_relative_volume.is_some_and(|rv| rv > c.above_average_volume),
    },
    ScoreRule {
        kind: RuleKind::LowEfficiency,
        points: 2.0,
        applies: |s, c| s.avg_volume_efficiency.is_some_and(|vei| vei < c.low_efficiency_max),
    },
    ScoreRule {
        kind: RuleKind::HighDarkPool,
        points: 3.0,
        applies: |s, c| s.avg_dark_pool_ratio.is_some_and(|dp| dp > c.dark_pool_min),
    },
    ScoreRule {
        kind: RuleKind::VeryHighVolume,
        points: 2.0,
        applies: |s, c| s.avg_relative_volume.is_some_and(|rv| rv > c.very_high_volume),
    },
    ScoreRule {
        kind: RuleKind::FlatPrice,
        points: 1.0,
        applies: |s, c| s.avg_price_change_pct.is_some_and(|pc| pc.abs() < c.flat_price_max),
    },
];

impl RuleKind {
    fn reason(self, stats: &WindowStats) -> String {
        let rv = stats.avg_relative_volume.unwrap_or_default();
        match self {
            RuleKind::AboveAverageVolume => format!("above-average volume ({rv:.2}x)"),
            RuleKind::LowEfficiency => format!(
                "high volume with low price correlation (VEI {:.2})",
                stats.avg_volume_efficiency.unwrap_or_default()
            ),
            RuleKind::HighDarkPool => {
                format!("high dark-pool volume ({:.1}%)", stats.dark_pool_ratio())
            }
            RuleKind::VeryHighVolume => format!("very high volume ({rv:.2}x)"),
            RuleKind::FlatPrice => format!(
                "price held flat ({:+.2}%)",
                stats.avg_price_change_pct.unwrap_or_default()
            ),
        }
    }
}

/// Sums the points of every rule that fires, capped at MAX_SCORE.
/// Returns the score and the fired rules in table order.
pub fn composite_score(stats: &WindowStats, cfg: &AccumulationConfig) -> (f64, Vec<RuleKind>) {
    let fired: Vec<&ScoreRule> = RULES.iter().filter(|r| r.applies(stats, cfg)).collect();
    let total: f64 = fired.iter().map(|r| r.points).sum();
    (total.min(MAX_SCORE), fired.iter().map(|r| r.kind).collect())
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

pub fn classify(score: f64, trend: ShortTrend) -> Signal {
    if score >= score_thresholds::STRONG {
        Signal::StrongAccumulation
    } else if score >= score_thresholds::ACCUMULATION {
        Signal::Accumulation
    } else if trend == ShortTrend::Increasing {
        if score < score_thresholds::DISTRIBUTION {
            Signal::Distribution
        } else {
            Signal::WeakDistribution
        }
    } else {
        Signal::Neutral
    }
}

/// Directional annotation from dark-pool share and short trend.
pub fn dark_pool_bias(stats: &WindowStats) -> Option<DarkPoolBias> {
    let dp = stats.dark_pool_ratio();
    match stats.short_trend {
        ShortTrend::Declining if dp > overlay_thresholds::BULLISH_MIN => Some(DarkPoolBias::Bullish),
        ShortTrend::Increasing if dp > overlay_thresholds::BEARISH_MIN => Some(DarkPoolBias::Bearish),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Scores the last `cfg.eval_window` metric rows. None when there are no rows.
pub fn score_window(
    ticker: &str,
    rows: &[MetricRow],
    cfg: &AccumulationConfig,
) -> Option<AccumulationResult> {
    let start = rows.len().saturating_sub(cfg.eval_window);
    let window = &rows[start..];
    let (first, last) = (window.first()?, window.last()?);

    let stats = WindowStats::from_rows(window, cfg);
    let price_change_pct = if first.close > 0.0 {
        (last.close / first.close - 1.0) * 100.0
    } else {
        0.0
    };

    Some(build_result(ticker, last.date, last.close, price_change_pct, &stats, cfg))
}

/// Builds metrics and scores one ticker's series. `Ok(None)` means the series
/// is too short to score; `Err` means the series itself is malformed.
pub fn evaluate(
    ticker: &str,
    bars: &[DailyBar],
    cfg: &AccumulationConfig,
) -> Result<Option<AccumulationResult>, SeriesError> {
    validate_series(bars)?;
    let rows = build_metrics(bars, cfg);
    Ok(score_window(ticker, &rows, cfg))
}

pub fn build_result(
    ticker: &str,
    date: NaiveDate,
    current_price: f64,
    price_change_pct: f64,
    stats: &WindowStats,
    cfg: &AccumulationConfig,
) -> AccumulationResult {
    let (score, fired) = composite_score(stats, cfg);
    let signal = classify(score, stats.short_trend);
    let confidence = signal.confidence();
    let bias = dark_pool_bias(stats);

    let mut reasons = Vec::new();
    if signal.is_accumulation() {
        reasons.push(format!("high accumulation score ({score:.1})"));
    }
    reasons.extend(fired.iter().map(|k| k.reason(stats)));
    if stats.high_activity_days > 0 {
        reasons.push(format!("{} high-activity days", stats.high_activity_days));
    }
    match signal {
        Signal::WeakDistribution | Signal::Distribution => {
            reasons.push(format!("rising short volume with low accumulation score ({score:.1})"))
        }
        _ => {}
    }
    match bias {
        Some(DarkPoolBias::Bullish) => {
            reasons.push("high dark-pool volume with declining shorts".to_string())
        }
        Some(DarkPoolBias::Bearish) => {
            reasons.push("rising short sales in dark pools".to_string())
        }
        None => {}
    }

    AccumulationResult {
        ticker: ticker.to_string(),
        date,
        score,
        signal,
        action: signal.action(),
        confidence,
        risk: confidence.risk(),
        reasons,
        high_activity_days: stats.high_activity_days,
        current_price,
        price_change_pct,
        avg_relative_volume: stats.avg_relative_volume,
        avg_volume_efficiency: stats.avg_volume_efficiency,
        dark_pool_ratio: stats.dark_pool_ratio(),
        short_trend: stats.short_trend,
        dark_pool_bias: bias,
    }
}

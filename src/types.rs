use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::SeriesError;

// ---------------------------------------------------------------------------
// Input series
// ---------------------------------------------------------------------------

/// One trading day for one ticker. FINRA fields are absent on days the
/// short-sale file has no row for the symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: f64,
    /// Exchange volume (shares).
    pub volume: f64,
    #[serde(default)]
    pub short_volume: Option<f64>,
    /// FINRA total reported volume.
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub short_exempt_volume: Option<f64>,
}

impl DailyBar {
    /// Dollar volume (close × shares).
    pub fn dollar_volume(&self) -> f64 {
        self.close * self.volume
    }
}

/// Caller-supplied metadata used by the derivative filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerMeta {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Aligned daily series for one ticker, ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerSeries {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    pub bars: Vec<DailyBar>,
}

impl TickerSeries {
    pub fn meta(&self) -> TickerMeta {
        TickerMeta {
            ticker: self.ticker.clone(),
            name: self.name.clone(),
        }
    }
}

/// Checks the series invariants: strictly ascending unique dates, finite
/// non-negative closes, non-negative volumes.
pub fn validate_series(bars: &[DailyBar]) -> std::result::Result<(), SeriesError> {
    let mut prev: Option<NaiveDate> = None;
    for bar in bars {
        if let Some(p) = prev {
            if bar.date == p {
                return Err(SeriesError::DuplicateDate(bar.date));
            }
            if bar.date < p {
                return Err(SeriesError::UnsortedDates(bar.date));
            }
        }
        if !bar.close.is_finite() || bar.close < 0.0 {
            return Err(SeriesError::InvalidClose(bar.date));
        }
        let negative = bar.volume < 0.0
            || [bar.short_volume, bar.total_volume, bar.short_exempt_volume]
                .iter()
                .flatten()
                .any(|v| *v < 0.0);
        if negative {
            return Err(SeriesError::NegativeVolume(bar.date));
        }
        prev = Some(bar.date);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Derived metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortTrend {
    Increasing,
    Declining,
    Stable,
}

impl std::fmt::Display for ShortTrend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ShortTrend::Increasing => "increasing",
            ShortTrend::Declining => "declining",
            ShortTrend::Stable => "stable",
        };
        write!(f, "{s}")
    }
}

/// Per-day metrics. `None` marks an undefined value (zero or missing
/// denominator); undefined values are excluded from window aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub close: f64,
    pub volume: f64,
    /// volume ÷ mean of the W preceding volumes.
    pub relative_volume: Option<f64>,
    /// Percent change of close over the price lookback.
    pub price_change_pct: Option<f64>,
    /// |price_change_pct| ÷ relative_volume.
    pub volume_efficiency: Option<f64>,
    /// short_volume ÷ exchange volume × 100, clamped to [0, 100].
    pub dark_pool_ratio: Option<f64>,
    /// Trend of the dark-pool ratio over the W bars ending at this date.
    pub short_trend: ShortTrend,
    pub high_activity: bool,
}

// ---------------------------------------------------------------------------
// Accumulation output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    StrongAccumulation,
    Accumulation,
    Neutral,
    WeakDistribution,
    Distribution,
}

impl Signal {
    pub const ALL: [Signal; 5] = [
        Signal::StrongAccumulation,
        Signal::Accumulation,
        Signal::Neutral,
        Signal::WeakDistribution,
        Signal::Distribution,
    ];

    pub fn action(self) -> Action {
        match self {
            Signal::StrongAccumulation | Signal::Accumulation => Action::Buy,
            Signal::Neutral => Action::Hold,
            Signal::WeakDistribution => Action::Reduce,
            Signal::Distribution => Action::Sell,
        }
    }

    pub fn confidence(self) -> Confidence {
        match self {
            Signal::StrongAccumulation => Confidence::High,
            Signal::Accumulation => Confidence::Medium,
            Signal::Neutral | Signal::WeakDistribution | Signal::Distribution => Confidence::Low,
        }
    }

    pub fn is_accumulation(self) -> bool {
        matches!(self, Signal::StrongAccumulation | Signal::Accumulation)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Signal::StrongAccumulation => "STRONG_ACCUMULATION",
            Signal::Accumulation => "ACCUMULATION",
            Signal::Neutral => "NEUTRAL",
            Signal::WeakDistribution => "WEAK_DISTRIBUTION",
            Signal::Distribution => "DISTRIBUTION",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Signal::ALL
            .into_iter()
            .find(|sig| sig.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown signal: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Hold,
    Reduce,
    Sell,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Action::Buy => "BUY",
            Action::Hold => "HOLD",
            Action::Reduce => "REDUCE",
            Action::Sell => "SELL",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Risk is the mirror of confidence.
    pub fn risk(self) -> Risk {
        match self {
            Confidence::High => Risk::Low,
            Confidence::Medium => Risk::Medium,
            Confidence::Low => Risk::High,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::Low => "LOW",
            Confidence::Medium => "MEDIUM",
            Confidence::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Risk {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Risk::Low => "LOW",
            Risk::Medium => "MEDIUM",
            Risk::High => "HIGH",
        };
        write!(f, "{s}")
    }
}

/// Directional annotation from dark-pool activity. Never changes the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DarkPoolBias {
    Bullish,
    Bearish,
}

impl std::fmt::Display for DarkPoolBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DarkPoolBias::Bullish => write!(f, "bullish"),
            DarkPoolBias::Bearish => write!(f, "bearish"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccumulationResult {
    pub ticker: String,
    pub date: NaiveDate,
    /// Composite score, 0 to 10.
    pub score: f64,
    pub signal: Signal,
    pub action: Action,
    pub confidence: Confidence,
    pub risk: Risk,
    pub reasons: Vec<String>,
    pub high_activity_days: usize,
    pub current_price: f64,
    /// Close-to-close change across the evaluation window.
    pub price_change_pct: f64,
    pub avg_relative_volume: Option<f64>,
    pub avg_volume_efficiency: Option<f64>,
    /// Reported as 0 when the window has no FINRA coverage.
    pub dark_pool_ratio: f64,
    pub short_trend: ShortTrend,
    pub dark_pool_bias: Option<DarkPoolBias>,
}

// ---------------------------------------------------------------------------
// Distribution output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistributionAction {
    #[serde(rename = "SELL/REDUCE")]
    SellReduce,
    #[serde(rename = "WATCH/REDUCE")]
    WatchReduce,
    #[serde(rename = "MONITOR")]
    Monitor,
}

impl std::fmt::Display for DistributionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DistributionAction::SellReduce => "SELL/REDUCE",
            DistributionAction::WatchReduce => "WATCH/REDUCE",
            DistributionAction::Monitor => "MONITOR",
        };
        write!(f, "{s}")
    }
}

/// Selling-pressure flag for one ticker. Only produced when at least one
/// distribution rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionResult {
    pub ticker: String,
    pub date: NaiveDate,
    /// Sum of fired rule points, 1 to 9.
    pub score: f64,
    pub risk: Risk,
    pub action: DistributionAction,
    pub reasons: Vec<String>,
    pub current_price: f64,
    pub price_change_pct: f64,
    /// Last volume ÷ mean volume over the evaluation window.
    pub volume_trend: Option<f64>,
    /// Pearson correlation of daily volume with |daily price change|.
    pub volume_price_correlation: Option<f64>,
}

// ---------------------------------------------------------------------------
// Shark output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SharkCategory {
    /// ratio >= 3.0
    Mega,
    /// 2.0 <= ratio < 3.0
    Big,
    /// 1.5 <= ratio < 2.0
    Regular,
}

impl std::fmt::Display for SharkCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SharkCategory::Mega => "mega",
            SharkCategory::Big => "big",
            SharkCategory::Regular => "regular",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for SharkCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mega" => Ok(SharkCategory::Mega),
            "big" => Ok(SharkCategory::Big),
            "regular" => Ok(SharkCategory::Regular),
            other => Err(format!("unknown shark category: {other}")),
        }
    }
}

/// One of the trailing bars kept for the blow-off pattern check.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecentBar {
    pub close: f64,
    pub dollar_volume: f64,
}

/// Summary statistics the categorizer consumes for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharkSnapshot {
    pub ticker: String,
    pub avg_volume_7d: f64,
    pub avg_volume_90d: f64,
    pub avg_price_90d: f64,
    pub current_price: f64,
    /// 7-day price change percent.
    pub price_change_pct: f64,
    pub price_change_30d_pct: Option<f64>,
    pub data_days: usize,
    /// Up to the last 20 bars, oldest first.
    #[serde(default)]
    pub recent: Vec<RecentBar>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharkResult {
    pub ticker: String,
    /// 7-day average volume ÷ 90-day average volume, rounded to 4 places.
    pub volume_ratio: f64,
    pub category: SharkCategory,
    pub silent: bool,
    /// volume_ratio × (1 + price_change_pct / 100), used for ranking.
    pub score: f64,
    pub avg_volume_7d: f64,
    pub avg_volume_90d: f64,
    pub avg_dollar_volume_90d: f64,
    pub avg_price_90d: f64,
    pub current_price: f64,
    pub price_change_pct: f64,
    pub price_change_30d_pct: Option<f64>,
}

/// Why a ticker was left out of the shark output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    Derivative,
    InsufficientHistory,
    LowAveragePrice,
    LowCurrentPrice,
    LowDollarVolume,
    NegativePerformance,
    LowVolumeRatio,
    NoCategory,
    DecliningAfterSpike,
}

impl std::fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExclusionReason::Derivative => "derivative",
            ExclusionReason::InsufficientHistory => "insufficient_history",
            ExclusionReason::LowAveragePrice => "low_average_price",
            ExclusionReason::LowCurrentPrice => "low_current_price",
            ExclusionReason::LowDollarVolume => "low_dollar_volume",
            ExclusionReason::NegativePerformance => "negative_performance",
            ExclusionReason::LowVolumeRatio => "low_volume_ratio",
            ExclusionReason::NoCategory => "no_category",
            ExclusionReason::DecliningAfterSpike => "declining_after_spike",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SharkOutcome {
    Shark(SharkResult),
    Excluded(ExclusionReason),
}

use crate::config::{SharkConfig, PATTERN_LOOKBACK, RATIO_DECIMALS};
use crate::detector::derivative::is_derivative;
use crate::types::{
    DailyBar, ExclusionReason, RecentBar, SharkCategory, SharkOutcome, SharkResult, SharkSnapshot,
    TickerMeta,
};

/// Bars in the short (spike) window.
const SHORT_WINDOW: usize = 7;
/// Bars in the baseline window that precedes the short window.
const BASELINE_WINDOW: usize = 90;
/// Bars back for the 30-day price change.
const MONTH_WINDOW: usize = 30;

impl SharkSnapshot {
    /// Summarises a daily series: the last 7 bars against the 90 bars before
    /// them (or every earlier bar when fewer exist). None when there is no
    /// baseline bar at all.
    pub fn from_bars(ticker: &str, bars: &[DailyBar]) -> Option<Self> {
        let n = bars.len();
        if n <= SHORT_WINDOW {
            return None;
        }

        let short = &bars[n - SHORT_WINDOW..];
        let baseline = &bars[n.saturating_sub(SHORT_WINDOW + BASELINE_WINDOW)..n - SHORT_WINDOW];
        let price_window = &bars[n.saturating_sub(BASELINE_WINDOW)..];

        let current_price = bars[n - 1].close;
        let change_from = |back: usize| {
            let base = bars[n - back].close;
            if base > 0.0 {
                (current_price - base) / base * 100.0
            } else {
                0.0
            }
        };

        Some(Self {
            ticker: ticker.to_string(),
            avg_volume_7d: mean(short.iter().map(|b| b.volume)),
            avg_volume_90d: mean(baseline.iter().map(|b| b.volume)),
            avg_price_90d: mean(price_window.iter().map(|b| b.close)),
            current_price,
            price_change_pct: change_from(SHORT_WINDOW),
            price_change_30d_pct: (n >= MONTH_WINDOW).then(|| change_from(MONTH_WINDOW)),
            data_days: n,
            recent: bars[n.saturating_sub(PATTERN_LOOKBACK)..]
                .iter()
                .map(|b| RecentBar {
                    close: b.close,
                    dollar_volume: b.dollar_volume(),
                })
                .collect(),
        })
    }

    pub fn avg_dollar_volume_90d(&self) -> f64 {
        self.avg_price_90d * self.avg_volume_90d
    }

    /// 7-day ÷ 90-day average volume, rounded for tier comparison.
    /// None when the baseline average is zero.
    pub fn volume_ratio(&self) -> Option<f64> {
        if self.avg_volume_90d > 0.0 {
            Some(round_ratio(self.avg_volume_7d / self.avg_volume_90d))
        } else {
            None
        }
    }
}

/// Rounds to RATIO_DECIMALS places so tier boundaries are stable across runs.
pub fn round_ratio(ratio: f64) -> f64 {
    let scale = 10f64.powi(RATIO_DECIMALS);
    (ratio * scale).round() / scale
}

/// First matching tier wins; below the regular tier there is no category.
pub fn categorize(ratio: f64, cfg: &SharkConfig) -> Option<SharkCategory> {
    if ratio >= cfg.mega_ratio {
        Some(SharkCategory::Mega)
    } else if ratio >= cfg.big_ratio {
        Some(SharkCategory::Big)
    } else if ratio >= cfg.regular_ratio {
        Some(SharkCategory::Regular)
    } else {
        None
    }
}

/// True when the bar four sessions back was a dollar-volume spike and each of
/// the three closes after it fell.
pub fn declining_after_spike(recent: &[RecentBar], spike_multiplier: f64) -> bool {
    if recent.len() < 4 {
        return false;
    }
    let mean_dollar_volume = mean(recent.iter().map(|b| b.dollar_volume));
    let tail = &recent[recent.len() - 4..];

    tail[0].dollar_volume > mean_dollar_volume * spike_multiplier
        && tail.windows(2).all(|pair| pair[1].close < pair[0].close)
}

/// Runs the eligibility gate, tiering, silent flag and the optional filters.
pub fn classify_shark(snapshot: &SharkSnapshot, meta: &TickerMeta, cfg: &SharkConfig) -> SharkOutcome {
    use ExclusionReason::*;

    if cfg.filter_derivatives && is_derivative(meta) {
        return SharkOutcome::Excluded(Derivative);
    }
    if snapshot.data_days < cfg.min_data_days {
        return SharkOutcome::Excluded(InsufficientHistory);
    }
    if snapshot.avg_price_90d < cfg.min_avg_price {
        return SharkOutcome::Excluded(LowAveragePrice);
    }
    if snapshot.current_price < cfg.min_current_price {
        return SharkOutcome::Excluded(LowCurrentPrice);
    }
    if snapshot.avg_dollar_volume_90d() < cfg.min_volume_usd {
        return SharkOutcome::Excluded(LowDollarVolume);
    }
    let ratio = match snapshot.volume_ratio() {
        Some(r) if r >= cfg.volume_ratio_min => r,
        _ => return SharkOutcome::Excluded(LowVolumeRatio),
    };
    if !cfg.allow_negative_performance && snapshot.price_change_pct < 0.0 {
        return SharkOutcome::Excluded(NegativePerformance);
    }
    let Some(category) = categorize(ratio, cfg) else {
        return SharkOutcome::Excluded(NoCategory);
    };
    if cfg.enable_pattern_detection && declining_after_spike(&snapshot.recent, cfg.spike_multiplier) {
        return SharkOutcome::Excluded(DecliningAfterSpike);
    }

    SharkOutcome::Shark(SharkResult {
        ticker: snapshot.ticker.clone(),
        volume_ratio: ratio,
        category,
        silent: snapshot.price_change_pct.abs() <= cfg.silent_threshold,
        score: ratio * (1.0 + snapshot.price_change_pct / 100.0),
        avg_volume_7d: snapshot.avg_volume_7d,
        avg_volume_90d: snapshot.avg_volume_90d,
        avg_dollar_volume_90d: snapshot.avg_dollar_volume_90d(),
        avg_price_90d: snapshot.avg_price_90d,
        current_price: snapshot.current_price,
        price_change_pct: snapshot.price_change_pct,
        price_change_30d_pct: snapshot.price_change_30d_pct,
    })
}

/// Builds the snapshot from a series and classifies it.
pub fn scan_series(meta: &TickerMeta, bars: &[DailyBar], cfg: &SharkConfig) -> SharkOutcome {
    match SharkSnapshot::from_bars(&meta.ticker, bars) {
        Some(snapshot) => classify_shark(&snapshot, meta, cfg),
        None => SharkOutcome::Excluded(ExclusionReason::InsufficientHistory),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

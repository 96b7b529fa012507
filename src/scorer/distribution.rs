use crate::config::distribution_thresholds as t;
use crate::types::{AccumulationResult, DailyBar, DistributionAction, DistributionResult, Risk};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// What the distribution rules look at for one ticker. The accumulation
/// fields come straight from that ticker's accumulation result.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionInputs {
    pub accumulation_score: f64,
    pub price_change_pct: f64,
    pub avg_volume_efficiency: Option<f64>,
    pub volume_trend: Option<f64>,
    pub volume_price_correlation: Option<f64>,
}

impl DistributionInputs {
    /// Volume statistics are taken over the last `eval_window` bars; one extra
    /// bar before the window supplies the first daily change.
    pub fn from_bars(acc: &AccumulationResult, bars: &[DailyBar], eval_window: usize) -> Self {
        let start = bars.len().saturating_sub(eval_window + 1);
        let window = &bars[start..];

        Self {
            accumulation_score: acc.score,
            price_change_pct: acc.price_change_pct,
            avg_volume_efficiency: acc.avg_volume_efficiency,
            volume_trend: volume_trend(&window[window.len().saturating_sub(eval_window)..]),
            volume_price_correlation: volume_price_correlation(window),
        }
    }
}

/// Last volume ÷ mean volume. None on an empty or all-zero window.
pub fn volume_trend(bars: &[DailyBar]) -> Option<f64> {
    let last = bars.last()?;
    let mean = bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64;
    (mean > 0.0).then(|| last.volume / mean)
}

/// Pearson correlation between each day's volume and the size of that day's
/// close-to-close move. None with fewer than 3 pairs or a constant column.
pub fn volume_price_correlation(bars: &[DailyBar]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = bars
        .windows(2)
        .filter(|w| w[0].close > 0.0)
        .map(|w| (w[1].volume, ((w[1].close / w[0].close - 1.0) * 100.0).abs()))
        .collect();
    pearson(&pairs)
}

fn pearson(pairs: &[(f64, f64)]) -> Option<f64> {
    if pairs.len() < 3 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionRuleKind {
    VolumeIntoDecline,
    PriceNotFollowing,
    EfficientSelling,
    NoAccumulation,
    CorrelatedVolume,
}

pub struct DistributionRule {
    pub kind: DistributionRuleKind,
    pub points: f64,
    applies: fn(&DistributionInputs) -> bool,
}

impl DistributionRule {
    pub fn applies(&self, inputs: &DistributionInputs) -> bool {
        (self.applies)(inputs)
    }
}

/// Comparisons are strict; an undefined input never fires a rule.
pub const DISTRIBUTION_RULES: [DistributionRule; 5] = [
    DistributionRule {
        kind: DistributionRuleKind::VolumeIntoDecline,
        points: 3.0,
        applies: |i| {
            i.volume_price_correlation.is_some_and(|c| c > t::HIGH_CORRELATION)
                && i.price_change_pct < t::PRICE_DECLINE
        },
    },
    DistributionRule {
        kind: DistributionRuleKind::PriceNotFollowing,
        points: 2.0,
        applies: |i| {
            i.volume_trend.is_some_and(|v| v > t::RISING_VOLUME) && i.price_change_pct < t::PRICE_LAGGING
        },
    },
    DistributionRule {
        kind: DistributionRuleKind::EfficientSelling,
        points: 2.0,
        applies: |i| {
            i.avg_volume_efficiency.is_some_and(|vei| vei < t::EFFICIENT_VOLUME) && i.price_change_pct < 0.0
        },
    },
    DistributionRule {
        kind: DistributionRuleKind::NoAccumulation,
        points: 1.0,
        applies: |i| {
            i.accumulation_score < t::NO_ACCUMULATION && i.volume_trend.is_some_and(|v| v > t::VOLUME_PRESENT)
        },
    },
    DistributionRule {
        kind: DistributionRuleKind::CorrelatedVolume,
        points: 1.0,
        applies: |i| i.volume_price_correlation.is_some_and(|c| c > t::VERY_HIGH_CORRELATION),
    },
];

impl DistributionRuleKind {
    fn reason(self, inputs: &DistributionInputs) -> String {
        let corr = inputs.volume_price_correlation.unwrap_or_default();
        let trend = inputs.volume_trend.unwrap_or_default();
        match self {
            DistributionRuleKind::VolumeIntoDecline => format!(
                "high volume during price decline ({:+.1}%, corr {corr:.2})",
                inputs.price_change_pct
            ),
            DistributionRuleKind::PriceNotFollowing => {
                format!("rising volume, price not following ({trend:.2}x)")
            }
            DistributionRuleKind::EfficientSelling => format!(
                "efficient volume pushing price down (VEI {:.2})",
                inputs.avg_volume_efficiency.unwrap_or_default()
            ),
            DistributionRuleKind::NoAccumulation => format!(
                "no accumulation but volume present (score {:.1})",
                inputs.accumulation_score
            ),
            DistributionRuleKind::CorrelatedVolume => {
                format!("volume highly correlated with price moves (corr {corr:.2})")
            }
        }
    }
}

pub fn distribution_score(inputs: &DistributionInputs) -> (f64, Vec<DistributionRuleKind>) {
    let fired: Vec<&DistributionRule> = DISTRIBUTION_RULES.iter().filter(|r| r.applies(inputs)).collect();
    (fired.iter().map(|r| r.points).sum(), fired.iter().map(|r| r.kind).collect())
}

pub fn classify_distribution(score: f64) -> (Risk, DistributionAction) {
    if score >= t::HIGH_RISK {
        (Risk::High, DistributionAction::SellReduce)
    } else if score >= t::MEDIUM_RISK {
        (Risk::Medium, DistributionAction::WatchReduce)
    } else {
        (Risk::Low, DistributionAction::Monitor)
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Flags selling pressure for a ticker that has already been scored for
/// accumulation. None when no rule fires.
pub fn evaluate_distribution(
    acc: &AccumulationResult,
    bars: &[DailyBar],
    eval_window: usize,
) -> Option<DistributionResult> {
    let inputs = DistributionInputs::from_bars(acc, bars, eval_window);
    build_distribution(acc, &inputs)
}

pub fn build_distribution(acc: &AccumulationResult, inputs: &DistributionInputs) -> Option<DistributionResult> {
    let (score, fired) = distribution_score(inputs);
    if fired.is_empty() {
        return None;
    }
    let (risk, action) = classify_distribution(score);

    Some(DistributionResult {
        ticker: acc.ticker.clone(),
        date: acc.date,
        score,
        risk,
        action,
        reasons: fired.iter().map(|k| k.reason(inputs)).collect(),
        current_price: acc.current_price,
        price_change_pct: inputs.price_change_pct,
        volume_trend: inputs.volume_trend,
        volume_price_correlation: inputs.volume_price_correlation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccumulationConfig;
    use crate::scorer::evaluate;
    use crate::types::{ShortTrend, Signal};
    use chrono::{Duration, NaiveDate};

    fn inputs(
        score: f64,
        pc: f64,
        vei: Option<f64>,
        trend: Option<f64>,
        corr: Option<f64>,
    ) -> DistributionInputs {
        DistributionInputs {
            accumulation_score: score,
            price_change_pct: pc,
            avg_volume_efficiency: vei,
            volume_trend: trend,
            volume_price_correlation: corr,
        }
    }

    fn acc(score: f64, pc: f64) -> AccumulationResult {
        let signal = Signal::Neutral;
        AccumulationResult {
            ticker: "XYZ".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            score,
            signal,
            action: signal.action(),
            confidence: signal.confidence(),
            risk: signal.confidence().risk(),
            reasons: vec![],
            high_activity_days: 0,
            current_price: 42.0,
            price_change_pct: pc,
            avg_relative_volume: Some(1.0),
            avg_volume_efficiency: None,
            dark_pool_ratio: 0.0,
            short_trend: ShortTrend::Stable,
            dark_pool_bias: None,
        }
    }

    /// Each bar moves the close by `moves[i]` percent; volume grows with the move.
    fn bars(moves: &[f64]) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mut close = 100.0;
        moves
            .iter()
            .enumerate()
            .map(|(i, m)| {
                close *= 1.0 + m / 100.0;
                DailyBar {
                    date: start + Duration::days(i as i64),
                    close,
                    volume: 1_000_000.0 * (1.0 + m.abs()),
                    short_volume: None,
                    total_volume: None,
                    short_exempt_volume: None,
                }
            })
            .collect()
    }

    #[test]
    fn every_rule_fires_on_heavy_selling() {
        let i = inputs(0.0, -6.0, Some(0.8), Some(1.3), Some(0.75));
        let (score, fired) = distribution_score(&i);
        assert_eq!(score, 9.0);
        assert_eq!(fired.len(), 5);

        let r = build_distribution(&acc(0.0, -6.0), &i).unwrap();
        assert_eq!(r.risk, Risk::High);
        assert_eq!(r.action, DistributionAction::SellReduce);
        assert_eq!(r.reasons.len(), 5);
        assert!(r.reasons[0].starts_with("high volume during price decline"));
    }

    #[test]
    fn quiet_ticker_is_not_flagged() {
        let i = inputs(5.0, 2.0, Some(1.5), Some(0.9), Some(0.1));
        assert!(build_distribution(&acc(5.0, 2.0), &i).is_none());
        let undefined = inputs(5.0, -10.0, None, None, None);
        assert!(build_distribution(&acc(5.0, -10.0), &undefined).is_none());
    }

    #[test]
    fn rule_boundaries_are_strict() {
        // corr at 0.6 or a decline of exactly 5% does not fire VolumeIntoDecline
        assert!(distribution_score(&inputs(5.0, -6.0, None, None, Some(0.6))).1.is_empty());
        assert!(distribution_score(&inputs(5.0, -5.0, None, None, Some(0.65))).1.is_empty());
        assert_eq!(
            distribution_score(&inputs(5.0, -6.0, None, None, Some(0.61))).1,
            vec![DistributionRuleKind::VolumeIntoDecline]
        );

        assert!(distribution_score(&inputs(5.0, 0.0, None, Some(1.2), None)).1.is_empty());
        assert!(distribution_score(&inputs(5.0, 5.0, None, Some(1.3), None)).1.is_empty());
        assert!(distribution_score(&inputs(5.0, -1.0, Some(1.0), None, None)).1.is_empty());
        assert!(distribution_score(&inputs(5.0, 0.0, Some(0.5), None, None)).1.is_empty());
        assert!(distribution_score(&inputs(1.5, 1.0, None, Some(1.1), None)).1.is_empty());
        assert_eq!(
            distribution_score(&inputs(1.4, 1.0, None, Some(1.1), None)).1,
            vec![DistributionRuleKind::NoAccumulation]
        );
        assert!(distribution_score(&inputs(5.0, 1.0, None, None, Some(0.7))).1.is_empty());
    }

    #[test]
    fn risk_ladder() {
        assert_eq!(classify_distribution(9.0), (Risk::High, DistributionAction::SellReduce));
        assert_eq!(classify_distribution(5.0), (Risk::High, DistributionAction::SellReduce));
        assert_eq!(classify_distribution(4.0), (Risk::Medium, DistributionAction::WatchReduce));
        assert_eq!(classify_distribution(3.0), (Risk::Medium, DistributionAction::WatchReduce));
        assert_eq!(classify_distribution(2.0), (Risk::Low, DistributionAction::Monitor));
        assert_eq!(classify_distribution(1.0), (Risk::Low, DistributionAction::Monitor));

        let r = build_distribution(&acc(5.0, -1.0), &inputs(5.0, -1.0, Some(0.5), Some(1.3), None)).unwrap();
        assert_eq!(r.score, 4.0);
        assert_eq!(r.action.to_string(), "WATCH/REDUCE");
    }

    #[test]
    fn correlation_and_trend_edge_cases() {
        let flat = bars(&[0.0; 10]);
        assert_eq!(volume_trend(&flat), Some(1.0));
        assert_eq!(volume_price_correlation(&flat), None);
        assert_eq!(volume_price_correlation(&flat[..3]), None);
        assert_eq!(volume_trend(&[]), None);

        let mut silent = flat.clone();
        for b in &mut silent {
            b.volume = 0.0;
        }
        assert_eq!(volume_trend(&silent), None);

        let moving = bars(&[0.0, -1.0, -3.0, -0.5, -2.0, -1.5]);
        let corr = volume_price_correlation(&moving).unwrap();
        assert!((corr - 1.0).abs() < 1e-9, "corr {corr}");
    }

    #[test]
    fn falling_series_on_heavy_volume_is_high_risk() {
        let moves: Vec<f64> = (0..60).map(|i| if i % 2 == 1 { -2.0 } else { -0.5 }).collect();
        let bars = bars(&moves);
        let cfg = AccumulationConfig::default();
        let acc = evaluate("XYZ", &bars, &cfg).unwrap().unwrap();
        assert!(acc.price_change_pct < -5.0);

        let r = evaluate_distribution(&acc, &bars, cfg.eval_window).unwrap();
        assert!(r.score >= 6.0, "score {}", r.score);
        assert_eq!(r.risk, Risk::High);
        assert!(r.volume_price_correlation.is_some_and(|c| c > 0.99));
        assert!(r.volume_trend.is_some_and(|v| v > 1.2));
        assert!(r.reasons.iter().any(|s| s.starts_with("high volume during price decline")));
    }

    #[test]
    fn steady_series_is_not_flagged() {
        let bars = bars(&[0.0; 60]);
        let cfg = AccumulationConfig::default();
        let acc = evaluate("XYZ", &bars, &cfg).unwrap().unwrap();
        assert!(evaluate_distribution(&acc, &bars, cfg.eval_window).is_none());
    }
}

use crate::config::AccumulationConfig;
use crate::types::{DailyBar, MetricRow, ShortTrend};

/// Builds one MetricRow per bar that has at least `cfg.window` bars before it.
/// Earlier bars are skipped, so the output length is `max(0, bars.len() - window)`.
///
/// Expects `bars` ascending by date with no duplicates (see `validate_series`).
pub fn build_metrics(bars: &[DailyBar], cfg: &AccumulationConfig) -> Vec<MetricRow> {
    let w = cfg.window;
    if w == 0 || bars.len() <= w {
        return Vec::new();
    }

    let ratios: Vec<Option<f64>> = bars.iter().map(dark_pool_ratio).collect();

    (w..bars.len())
        .map(|i| {
            let bar = &bars[i];
            let relative_volume = relative_volume(bars, i, w);
            let price_change_pct = price_change_pct(bars, i, cfg.price_lookback);
            let volume_efficiency = volume_efficiency(price_change_pct, relative_volume);
            let dark_pool_ratio = ratios[i];
            let short_trend = short_trend(&ratios[i + 1 - w..=i], cfg.short_trend_tolerance);
            let high_activity = is_high_activity(relative_volume, dark_pool_ratio, cfg);

            MetricRow {
                date: bar.date,
                close: bar.close,
                volume: bar.volume,
                relative_volume,
                price_change_pct,
                volume_efficiency,
                dark_pool_ratio,
                short_trend,
                high_activity,
            }
        })
        .collect()
}

/// `volume[i] / mean(volume[i-w..i])`; undefined when the trailing mean is zero.
fn relative_volume(bars: &[DailyBar], i: usize, w: usize) -> Option<f64> {
    let trailing = &bars[i - w..i];
    let mean = trailing.iter().map(|b| b.volume).sum::<f64>() / w as f64;
    if mean > 0.0 {
        Some(bars[i].volume / mean)
    } else {
        None
    }
}

fn price_change_pct(bars: &[DailyBar], i: usize, lookback: usize) -> Option<f64> {
    let lookback = lookback.min(i);
    if lookback == 0 {
        return None;
    }
    let base = bars[i - lookback].close;
    if base > 0.0 {
        Some((bars[i].close / base - 1.0) * 100.0)
    } else {
        None
    }
}

/// Volume Efficiency Index: |price change %| ÷ relative volume.
pub fn volume_efficiency(price_change_pct: Option<f64>, relative_volume: Option<f64>) -> Option<f64> {
    match (price_change_pct, relative_volume) {
        (Some(pc), Some(rv)) if rv > 0.0 => Some(pc.abs() / rv),
        _ => None,
    }
}

/// FINRA short volume as a percent of exchange volume, clamped to [0, 100].
/// Undefined when either side is missing or exchange volume is zero.
pub fn dark_pool_ratio(bar: &DailyBar) -> Option<f64> {
    let short = bar.short_volume?;
    if bar.volume > 0.0 {
        Some((short / bar.volume * 100.0).clamp(0.0, 100.0))
    } else {
        None
    }
}

/// Compares the mean defined ratio of the first half of `ratios` with the
/// second half. A half with no defined values yields Stable.
pub fn short_trend(ratios: &[Option<f64>], tolerance: f64) -> ShortTrend {
    let mid = ratios.len() / 2;
    let (first, second) = ratios.split_at(mid);
    let (Some(first), Some(second)) = (mean_defined(first), mean_defined(second)) else {
        return ShortTrend::Stable;
    };

    if second < first * (1.0 - tolerance) {
        ShortTrend::Declining
    } else if second > first * (1.0 + tolerance) {
        ShortTrend::Increasing
    } else {
        ShortTrend::Stable
    }
}

/// Spike day whose dark-pool share, when known, is above the floor.
fn is_high_activity(
    relative_volume: Option<f64>,
    dark_pool_ratio: Option<f64>,
    cfg: &AccumulationConfig,
) -> bool {
    let spike = relative_volume.is_some_and(|rv| rv >= cfg.spike_multiplier);
    spike && dark_pool_ratio.map_or(true, |dp| dp > cfg.high_activity_dp_floor)
}

/// Mean of the defined values; None when there are none.
pub fn mean_defined(values: &[Option<f64>]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn series(volumes: &[f64], closes: &[f64]) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        volumes
            .iter()
            .zip(closes)
            .enumerate()
            .map(|(i, (&volume, &close))| DailyBar {
                date: start + Duration::days(i as i64),
                close,
                volume,
                short_volume: None,
                total_volume: None,
                short_exempt_volume: None,
            })
            .collect()
    }

    fn cfg(window: usize) -> AccumulationConfig {
        AccumulationConfig {
            window,
            price_lookback: window,
            ..AccumulationConfig::default()
        }
    }

    #[test]
    fn output_length_is_input_minus_window() {
        for n in 0..30 {
            let bars = series(&vec![100.0; n], &vec![10.0; n]);
            let rows = build_metrics(&bars, &cfg(5));
            assert_eq!(rows.len(), n.saturating_sub(5), "n = {n}");
        }
    }

    #[test]
    fn first_row_is_dated_after_window() {
        let bars = series(&[100.0; 8], &[10.0; 8]);
        let rows = build_metrics(&bars, &cfg(5));
        assert_eq!(rows[0].date, bars[5].date);
    }

    #[test]
    fn relative_volume_uses_trailing_mean() {
        let bars = series(&[100.0, 100.0, 100.0, 100.0, 300.0], &[10.0; 5]);
        let rows = build_metrics(&bars, &cfg(4));
        assert_eq!(rows.len(), 1);
        assert!((rows[0].relative_volume.unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_trailing_volume_leaves_relative_volume_undefined() {
        let bars = series(&[0.0, 0.0, 0.0, 500.0], &[10.0, 10.0, 10.0, 11.0]);
        let rows = build_metrics(&bars, &cfg(3));
        assert_eq!(rows[0].relative_volume, None);
        assert_eq!(rows[0].volume_efficiency, None);
        assert!(!rows[0].high_activity);
    }

    #[test]
    fn price_change_and_vei() {
        let bars = series(&[100.0, 100.0, 200.0], &[10.0, 10.0, 10.4]);
        let rows = build_metrics(&bars, &cfg(2));
        let row = &rows[0];
        assert!((row.price_change_pct.unwrap() - 4.0).abs() < 1e-9);
        assert!((row.relative_volume.unwrap() - 2.0).abs() < 1e-12);
        assert!((row.volume_efficiency.unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn dark_pool_ratio_is_clamped_and_optional() {
        let mut bars = series(&[100.0, 100.0, 0.0], &[10.0; 3]);
        bars[0].short_volume = Some(40.0);
        bars[1].short_volume = Some(250.0);
        bars[2].short_volume = Some(10.0);

        assert_eq!(dark_pool_ratio(&bars[0]), Some(40.0));
        assert_eq!(dark_pool_ratio(&bars[1]), Some(100.0));
        assert_eq!(dark_pool_ratio(&bars[2]), None);

        bars[0].short_volume = None;
        assert_eq!(dark_pool_ratio(&bars[0]), None);
    }

    #[test]
    fn dark_pool_ratio_always_within_bounds() {
        let shorts = [0.0, 1.0, 50.0, 99.0, 100.0, 101.0, 1e9];
        for s in shorts {
            let mut bar = series(&[100.0], &[10.0]).remove(0);
            bar.short_volume = Some(s);
            let dp = dark_pool_ratio(&bar).unwrap();
            assert!((0.0..=100.0).contains(&dp), "short = {s}, dp = {dp}");
        }
    }

    #[test]
    fn short_trend_halves() {
        let declining = [Some(40.0), Some(40.0), Some(30.0), Some(30.0)];
        assert_eq!(short_trend(&declining, 0.05), ShortTrend::Declining);

        let increasing = [Some(30.0), Some(30.0), Some(40.0), Some(40.0)];
        assert_eq!(short_trend(&increasing, 0.05), ShortTrend::Increasing);

        // 4% move stays inside the 5% tolerance
        let flat = [Some(50.0), Some(50.0), Some(52.0), Some(52.0)];
        assert_eq!(short_trend(&flat, 0.05), ShortTrend::Stable);
    }

    #[test]
    fn short_trend_ignores_gaps() {
        let gapped = [Some(40.0), None, None, Some(20.0)];
        assert_eq!(short_trend(&gapped, 0.05), ShortTrend::Declining);

        let one_sided = [None, None, Some(20.0), Some(30.0)];
        assert_eq!(short_trend(&one_sided, 0.05), ShortTrend::Stable);
    }

    #[test]
    fn high_activity_needs_spike_and_dark_pool_floor() {
        let mut bars = series(&[100.0, 100.0, 250.0], &[10.0; 3]);
        bars[2].short_volume = Some(100.0); // 40%
        let rows = build_metrics(&bars, &cfg(2));
        assert!(rows[0].high_activity);

        bars[2].short_volume = Some(25.0); // 10%, below the 20% floor
        let rows = build_metrics(&bars, &cfg(2));
        assert!(!rows[0].high_activity);

        // No FINRA row: qualifies on volume alone
        bars[2].short_volume = None;
        let rows = build_metrics(&bars, &cfg(2));
        assert!(rows[0].high_activity);
    }
}

use crate::error::{AppError, Result};

/// Trailing window (bars) for relative volume and short trend.
pub const DEFAULT_WINDOW: usize = 20;

/// Bars aggregated by the accumulation scorer.
pub const DEFAULT_EVAL_WINDOW: usize = 20;

/// Relative volume at or above this marks a volume spike.
pub const DEFAULT_SPIKE_MULTIPLIER: f64 = 2.0;

/// Dark-pool ratio (%) a spike day must exceed to count as high activity.
pub const DEFAULT_HIGH_ACTIVITY_DP_FLOOR: f64 = 20.0;

/// Relative tolerance between window halves before the short trend leaves Stable.
pub const DEFAULT_SHORT_TREND_TOLERANCE: f64 = 0.05;

/// Composite score ceiling.
pub const MAX_SCORE: f64 = 10.0;

/// Decimal places the shark volume ratio is rounded to before tier comparison.
pub const RATIO_DECIMALS: i32 = 4;

/// Bars kept on a shark snapshot for the blow-off pattern check.
pub const PATTERN_LOOKBACK: usize = 20;

/// Scan interval (seconds) for the periodic rescan of the data directory.
pub const SCAN_INTERVAL_SECS: u64 = 3600;

/// Bounded channel capacity between the scan scheduler and the DB writer.
pub const CHANNEL_CAPACITY: usize = 16;

/// Accumulation score thresholds (composite, 0-10).
pub mod score_thresholds {
    pub const STRONG: f64 = 7.0;
    pub const ACCUMULATION: f64 = 4.0;
    pub const DISTRIBUTION: f64 = 2.0;
}

/// Dark-pool ratio (%) thresholds for the directional overlay.
pub mod overlay_thresholds {
    pub const BULLISH_MIN: f64 = 35.0;
    pub const BEARISH_MIN: f64 = 30.0;
}

/// Distribution rule thresholds and the risk ladder.
pub mod distribution_thresholds {
    pub const HIGH_CORRELATION: f64 = 0.6;
    pub const VERY_HIGH_CORRELATION: f64 = 0.7;
    /// Period price change (%) below this counts as a decline.
    pub const PRICE_DECLINE: f64 = -5.0;
    /// Period price change (%) below this counts as not following volume.
    pub const PRICE_LAGGING: f64 = 5.0;
    pub const RISING_VOLUME: f64 = 1.2;
    pub const VOLUME_PRESENT: f64 = 1.0;
    pub const EFFICIENT_VOLUME: f64 = 1.0;
    /// Accumulation score below this counts as no accumulation.
    pub const NO_ACCUMULATION: f64 = 1.5;
    pub const HIGH_RISK: f64 = 5.0;
    pub const MEDIUM_RISK: f64 = 3.0;
}

/// Volume-ratio tiers for shark categories.
pub mod shark_tiers {
    pub const MEGA: f64 = 3.0;
    pub const BIG: f64 = 2.0;
    pub const REGULAR: f64 = 1.5;
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct AccumulationConfig {
    pub window: usize,
    /// Bars back for the per-day price change. Must not exceed `window`.
    pub price_lookback: usize,
    pub eval_window: usize,
    pub spike_multiplier: f64,
    pub high_activity_dp_floor: f64,
    pub short_trend_tolerance: f64,
    /// Average relative volume above this earns the volume points.
    pub above_average_volume: f64,
    /// Average relative volume above this earns the additional points.
    pub very_high_volume: f64,
    /// Average VEI below this counts as low efficiency.
    pub low_efficiency_max: f64,
    /// Average dark-pool ratio (%) above this earns the dark-pool points.
    pub dark_pool_min: f64,
    /// |average price change| (%) below this counts as a flat price.
    pub flat_price_max: f64,
}

impl Default for AccumulationConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            price_lookback: DEFAULT_WINDOW,
            eval_window: DEFAULT_EVAL_WINDOW,
            spike_multiplier: DEFAULT_SPIKE_MULTIPLIER,
            high_activity_dp_floor: DEFAULT_HIGH_ACTIVITY_DP_FLOOR,
            short_trend_tolerance: DEFAULT_SHORT_TREND_TOLERANCE,
            above_average_volume: 1.0,
            very_high_volume: 2.0,
            low_efficiency_max: 0.5,
            dark_pool_min: 35.0,
            flat_price_max: 3.0,
        }
    }
}

impl AccumulationConfig {
    pub fn validate(&self) -> Result<()> {
        require_finite(&[
            ("spike_multiplier", self.spike_multiplier),
            ("high_activity_dp_floor", self.high_activity_dp_floor),
            ("short_trend_tolerance", self.short_trend_tolerance),
            ("above_average_volume", self.above_average_volume),
            ("very_high_volume", self.very_high_volume),
            ("low_efficiency_max", self.low_efficiency_max),
            ("dark_pool_min", self.dark_pool_min),
            ("flat_price_max", self.flat_price_max),
        ])?;
        if self.window < 2 {
            return invalid("window must be at least 2 bars");
        }
        if self.price_lookback == 0 || self.price_lookback > self.window {
            return invalid("price_lookback must be between 1 and window");
        }
        if self.eval_window == 0 {
            return invalid("eval_window must be positive");
        }
        if !(self.spike_multiplier.is_finite() && self.spike_multiplier > 0.0) {
            return invalid("spike_multiplier must be positive");
        }
        if !(0.0..=100.0).contains(&self.high_activity_dp_floor)
            || !(0.0..=100.0).contains(&self.dark_pool_min)
        {
            return invalid("dark-pool thresholds must lie in [0, 100]");
        }
        if !(0.0..1.0).contains(&self.short_trend_tolerance) {
            return invalid("short_trend_tolerance must lie in [0, 1)");
        }
        if !(self.above_average_volume > 0.0 && self.above_average_volume < self.very_high_volume) {
            return invalid("volume tiers must satisfy 0 < above_average_volume < very_high_volume");
        }
        if self.low_efficiency_max <= 0.0 || self.flat_price_max <= 0.0 {
            return invalid("low_efficiency_max and flat_price_max must be positive");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SharkConfig {
    /// Minimum 90-day average dollar volume (USD).
    pub min_volume_usd: f64,
    pub volume_ratio_min: f64,
    pub spike_multiplier: f64,
    pub min_avg_price: f64,
    pub min_current_price: f64,
    pub allow_negative_performance: bool,
    /// |price change| (%) at or below this flags a silent shark.
    pub silent_threshold: f64,
    pub min_data_days: usize,
    pub filter_derivatives: bool,
    pub enable_pattern_detection: bool,
    pub mega_ratio: f64,
    pub big_ratio: f64,
    pub regular_ratio: f64,
}

impl Default for SharkConfig {
    fn default() -> Self {
        Self {
            min_volume_usd: 10_000_000.0,
            volume_ratio_min: 1.5,
            spike_multiplier: DEFAULT_SPIKE_MULTIPLIER,
            min_avg_price: 5.0,
            min_current_price: 10.0,
            allow_negative_performance: false,
            silent_threshold: 5.0,
            min_data_days: 90,
            filter_derivatives: true,
            enable_pattern_detection: true,
            mega_ratio: shark_tiers::MEGA,
            big_ratio: shark_tiers::BIG,
            regular_ratio: shark_tiers::REGULAR,
        }
    }
}

impl SharkConfig {
    pub fn validate(&self) -> Result<()> {
        require_finite(&[
            ("min_volume_usd", self.min_volume_usd),
            ("volume_ratio_min", self.volume_ratio_min),
            ("spike_multiplier", self.spike_multiplier),
            ("min_avg_price", self.min_avg_price),
            ("min_current_price", self.min_current_price),
            ("silent_threshold", self.silent_threshold),
            ("mega_ratio", self.mega_ratio),
            ("big_ratio", self.big_ratio),
            ("regular_ratio", self.regular_ratio),
        ])?;
        if !(self.regular_ratio > 0.0
            && self.regular_ratio < self.big_ratio
            && self.big_ratio < self.mega_ratio)
        {
            return invalid("ratio tiers must be strictly ordered: 0 < regular < big < mega");
        }
        if self.volume_ratio_min < 0.0 {
            return invalid("volume_ratio_min must be non-negative");
        }
        if self.min_volume_usd < 0.0 || self.min_avg_price < 0.0 || self.min_current_price < 0.0 {
            return invalid("volume and price floors must be non-negative");
        }
        if self.silent_threshold < 0.0 {
            return invalid("silent_threshold must be non-negative");
        }
        if self.min_data_days < 8 {
            // Needs the 7-day window plus at least one baseline bar.
            return invalid("min_data_days must be at least 8");
        }
        if !(self.spike_multiplier.is_finite() && self.spike_multiplier > 0.0) {
            return invalid("spike_multiplier must be positive");
        }
        Ok(())
    }
}

fn invalid<T>(msg: &str) -> Result<T> {
    Err(AppError::InvalidConfig(msg.to_string()))
}

/// NaN compares false against every threshold, which would switch a gate off.
fn require_finite(fields: &[(&str, f64)]) -> Result<()> {
    match fields.iter().find(|(_, v)| !v.is_finite()) {
        Some((name, v)) => Err(AppError::InvalidConfig(format!("{name} must be finite, got {v}"))),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Directory of per-ticker JSON series files (DATA_DIR)
    pub data_dir: String,
    /// Seconds between rescans of the data directory (SCAN_INTERVAL_SECS)
    pub scan_interval_secs: u64,
    /// Rows logged in the ranked summary (SCAN_TOP_N)
    pub top_n: usize,
    pub accumulation: AccumulationConfig,
    pub shark: SharkConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let acc_defaults = AccumulationConfig::default();
        let shark_defaults = SharkConfig::default();

        let window = env_or("ACCUM_WINDOW", acc_defaults.window)?;
        let accumulation = AccumulationConfig {
            window,
            price_lookback: env_or("ACCUM_PRICE_LOOKBACK", window)?,
            eval_window: env_or("ACCUM_EVAL_WINDOW", acc_defaults.eval_window)?,
            spike_multiplier: env_or("ACCUM_SPIKE_MULTIPLIER", acc_defaults.spike_multiplier)?,
            high_activity_dp_floor: env_or(
                "ACCUM_HIGH_ACTIVITY_DP_FLOOR",
                acc_defaults.high_activity_dp_floor,
            )?,
            ..acc_defaults
        };

        let shark = SharkConfig {
            min_volume_usd: env_or("SHARK_MIN_VOLUME_USD", shark_defaults.min_volume_usd)?,
            volume_ratio_min: env_or("SHARK_VOLUME_RATIO_MIN", shark_defaults.volume_ratio_min)?,
            spike_multiplier: env_or("SHARK_SPIKE_MULTIPLIER", shark_defaults.spike_multiplier)?,
            min_avg_price: env_or("SHARK_MIN_AVG_PRICE", shark_defaults.min_avg_price)?,
            min_current_price: env_or("SHARK_MIN_CURRENT_PRICE", shark_defaults.min_current_price)?,
            allow_negative_performance: env_or(
                "SHARK_ALLOW_NEGATIVE",
                shark_defaults.allow_negative_performance,
            )?,
            silent_threshold: env_or("SHARK_SILENT_THRESHOLD", shark_defaults.silent_threshold)?,
            min_data_days: env_or("SHARK_MIN_DATA_DAYS", shark_defaults.min_data_days)?,
            filter_derivatives: env_or("SHARK_FILTER_DERIVATIVES", shark_defaults.filter_derivatives)?,
            enable_pattern_detection: env_or(
                "SHARK_PATTERN_DETECTION",
                shark_defaults.enable_pattern_detection,
            )?,
            ..shark_defaults
        };

        accumulation.validate()?;
        shark.validate()?;

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "scanner.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            scan_interval_secs: env_or("SCAN_INTERVAL_SECS", SCAN_INTERVAL_SECS)?,
            top_n: env_or("SCAN_TOP_N", 15usize)?,
            accumulation,
            shark,
        })
    }
}

/// Reads `key` and parses it; unset means `default`, unparsable is an error.
fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw}"))),
        Err(_) => Ok(default),
    }
}

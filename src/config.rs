use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::types::DEFAULT_INDICES;

/// How a simple moving average behaves when fewer closes than its period exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaPolicy {
    /// Emit null until the full period is available.
    Strict,
    /// Average whatever closes are available.
    Shrinking,
}

impl MaPolicy {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "shrinking" | "shrink" => Some(Self::Shrinking),
            _ => None,
        }
    }
}

/// Thresholds and look-back lengths for the signal classifiers.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Trading days loaded per security (default: 65).
    pub window_days: usize,
    /// Trailing days (re)computed per run (default: 30).
    pub days_to_compute: usize,
    /// Volume counts as a surge at this multiple of the average (default: 1.2).
    pub volume_ratio: f64,
    /// Prior days averaged for the volume baseline (default: 5).
    pub avg_volume_days: usize,
    /// Days of same-sign net flow needed, inclusive of today (default: 5).
    pub sustained_flow_days: usize,
    /// Prior days forming the support/resistance band (default: 20).
    pub support_resistance_days: usize,
    /// Nearness threshold as a fraction of band width (default: 0.02).
    pub near_band_pct: f64,
    /// Nearness threshold as a fraction of close for a flat band (default: 0.01).
    pub flat_band_pct: f64,
    /// Turnover below this percentage is quiet (default: 3.0).
    pub turnover_quiet_below: f64,
    /// Turnover up to and including this percentage is active (default: 10.0).
    pub turnover_active_max: f64,
    /// Prior days in the divergence window (default: 10).
    pub divergence_days: usize,
    /// Prior days forming the breakout band (default: 20).
    pub breakout_days: usize,
    /// Trailing days of the volatility comparison, inclusive of today (default: 5).
    pub volatility_recent_days: usize,
    /// Days preceding the trailing block used as baseline (default: 10).
    pub volatility_baseline_days: usize,
    /// Trailing range at this multiple of baseline counts as expansion (default: 1.2).
    pub volatility_expand_ratio: f64,
    /// Indices with fewer bars are skipped (default: 25).
    pub index_min_days: usize,
    /// MA policy used when persisting stock indicators (default: strict).
    pub stock_ma_policy: MaPolicy,
    /// MA policy used for on-the-fly index indicators (default: shrinking).
    pub index_ma_policy: MaPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_days: 65,
            days_to_compute: 30,
            volume_ratio: 1.2,
            avg_volume_days: 5,
            sustained_flow_days: 5,
            support_resistance_days: 20,
            near_band_pct: 0.02,
            flat_band_pct: 0.01,
            turnover_quiet_below: 3.0,
            turnover_active_max: 10.0,
            divergence_days: 10,
            breakout_days: 20,
            volatility_recent_days: 5,
            volatility_baseline_days: 10,
            volatility_expand_ratio: 1.2,
            index_min_days: 25,
            stock_ma_policy: MaPolicy::Strict,
            index_ma_policy: MaPolicy::Shrinking,
        }
    }
}

impl EngineConfig {
    /// Load thresholds from `SIGNAL_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            window_days: env_or("SIGNAL_WINDOW_DAYS", d.window_days),
            days_to_compute: env_or("SIGNAL_DAYS_TO_COMPUTE", d.days_to_compute),
            volume_ratio: env_or("SIGNAL_VOLUME_RATIO", d.volume_ratio),
            avg_volume_days: env_or("SIGNAL_AVG_VOLUME_DAYS", d.avg_volume_days),
            sustained_flow_days: env_or("SIGNAL_SUSTAINED_FLOW_DAYS", d.sustained_flow_days),
            support_resistance_days: env_or("SIGNAL_SUPPORT_RESISTANCE_DAYS", d.support_resistance_days),
            near_band_pct: env_or("SIGNAL_NEAR_BAND_PCT", d.near_band_pct),
            flat_band_pct: env_or("SIGNAL_FLAT_BAND_PCT", d.flat_band_pct),
            turnover_quiet_below: env_or("SIGNAL_TURNOVER_QUIET_BELOW", d.turnover_quiet_below),
            turnover_active_max: env_or("SIGNAL_TURNOVER_ACTIVE_MAX", d.turnover_active_max),
            divergence_days: env_or("SIGNAL_DIVERGENCE_DAYS", d.divergence_days),
            breakout_days: env_or("SIGNAL_BREAKOUT_DAYS", d.breakout_days),
            volatility_recent_days: env_or("SIGNAL_VOLATILITY_RECENT_DAYS", d.volatility_recent_days),
            volatility_baseline_days: env_or("SIGNAL_VOLATILITY_BASELINE_DAYS", d.volatility_baseline_days),
            volatility_expand_ratio: env_or("SIGNAL_VOLATILITY_EXPAND_RATIO", d.volatility_expand_ratio),
            index_min_days: env_or("SIGNAL_INDEX_MIN_DAYS", d.index_min_days),
            stock_ma_policy: env::var("SIGNAL_STOCK_MA_POLICY")
                .ok()
                .and_then(|v| MaPolicy::from_str(&v))
                .unwrap_or(d.stock_ma_policy),
            index_ma_policy: env::var("SIGNAL_INDEX_MA_POLICY")
                .ok()
                .and_then(|v| MaPolicy::from_str(&v))
                .unwrap_or(d.index_ma_policy),
        }
    }
}

/// Geometry thresholds for the pattern scanner.
#[derive(Debug, Clone)]
pub struct PatternConfig {
    /// Trading days loaded per security (default: 65).
    pub window_days: usize,
    /// Securities with fewer bars are not scanned (default: 40).
    pub min_history: usize,
    /// Trailing days evaluated as possible completion days (default: 1).
    pub scan_days: usize,
    /// Length of the cup window (default: 40).
    pub cup_days: usize,
    /// Bars at each edge of the cup the low may not fall into (default: 8).
    pub cup_edge_days: usize,
    /// Right rim must reach this fraction of the left rim (default: 0.92).
    pub cup_recovery_ratio: f64,
    /// Length of the handle (default: 5).
    pub handle_days: usize,
    /// Minimum handle pullback as a fraction of handle high (default: 0.01).
    pub handle_min_pullback: f64,
    /// Maximum handle pullback as a fraction of handle high (default: 0.20).
    pub handle_max_pullback: f64,
    /// Minimum body of the first rising-three candle relative to open (default: 0.015).
    pub rising_first_body_pct: f64,
    /// Tolerance of the middle candles around the first candle's range (default: 0.02).
    pub rising_containment_pct: f64,
    /// Window for the recent-totals report, in calendar days (default: 60).
    pub recent_report_days: i64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            window_days: 65,
            min_history: 40,
            scan_days: 1,
            cup_days: 40,
            cup_edge_days: 8,
            cup_recovery_ratio: 0.92,
            handle_days: 5,
            handle_min_pullback: 0.01,
            handle_max_pullback: 0.20,
            rising_first_body_pct: 0.015,
            rising_containment_pct: 0.02,
            recent_report_days: 60,
        }
    }
}

impl PatternConfig {
    /// Load thresholds from `PATTERN_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            window_days: env_or("PATTERN_WINDOW_DAYS", d.window_days),
            min_history: env_or("PATTERN_MIN_HISTORY", d.min_history),
            scan_days: env_or("PATTERN_SCAN_DAYS", d.scan_days),
            cup_days: env_or("PATTERN_CUP_DAYS", d.cup_days),
            cup_edge_days: env_or("PATTERN_CUP_EDGE_DAYS", d.cup_edge_days),
            cup_recovery_ratio: env_or("PATTERN_CUP_RECOVERY_RATIO", d.cup_recovery_ratio),
            handle_days: env_or("PATTERN_HANDLE_DAYS", d.handle_days),
            handle_min_pullback: env_or("PATTERN_HANDLE_MIN_PULLBACK", d.handle_min_pullback),
            handle_max_pullback: env_or("PATTERN_HANDLE_MAX_PULLBACK", d.handle_max_pullback),
            rising_first_body_pct: env_or("PATTERN_RISING_FIRST_BODY_PCT", d.rising_first_body_pct),
            rising_containment_pct: env_or("PATTERN_RISING_CONTAINMENT_PCT", d.rising_containment_pct),
            recent_report_days: env_or("PATTERN_RECENT_REPORT_DAYS", d.recent_report_days),
        }
    }
}

/// Bounded retry applied to ingestion writes that hit a busy database.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first (default: 3).
    pub attempts: u32,
    /// Fixed wait between attempts (default: 500 ms).
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Index codes evaluated by the index pipeline.
    pub index_codes: Vec<String>,
    /// Signal classifier thresholds.
    pub engine: EngineConfig,
    /// Pattern scanner thresholds.
    pub patterns: PatternConfig,
    /// Ingestion retry policy.
    pub retry: RetryConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        // Format: "000001.SH,399001.SZ"
        let index_codes = env::var("STEX_INDEX_CODES")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|codes| !codes.is_empty())
            .unwrap_or_else(default_index_codes);

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 8000),
            database_path: env::var("STEX_DB_PATH").unwrap_or_else(|_| "stex.db".to_string()),
            index_codes,
            engine: EngineConfig::from_env(),
            patterns: PatternConfig::from_env(),
            retry: RetryConfig {
                attempts: env_or("INGEST_RETRY_ATTEMPTS", 3),
                backoff: Duration::from_millis(env_or("INGEST_RETRY_BACKOFF_MS", 500)),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            database_path: "stex.db".to_string(),
            index_codes: default_index_codes(),
            engine: EngineConfig::default(),
            patterns: PatternConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_index_codes() -> Vec<String> {
    DEFAULT_INDICES.iter().map(|(code, _)| code.to_string()).collect()
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

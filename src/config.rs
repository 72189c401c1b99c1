//! Pipeline configuration
//!
//! Every option has a default, so an empty TOML document is a valid
//! configuration. Values are validated once, at load time; out-of-range
//! parameters are rejected rather than clamped.

use std::fs;
use std::path::Path;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::ComputeError;

pub const DEFAULT_ALPHA: f64 = 0.5;
pub const DEFAULT_LAMBDA: f64 = 0.3;
pub const DEFAULT_FORECAST_DAYS: u32 = 14;
pub const MAX_FORECAST_DAYS: u32 = 365;
pub const DEFAULT_MIN_HISTORY_DAYS: usize = 2;
pub const DEFAULT_LEVEL_SMOOTHING: f64 = 0.5;
pub const DEFAULT_TREND_SMOOTHING: f64 = 0.3;
pub const DEFAULT_Z: f64 = 1.0;
pub const DEFAULT_MIN_HALF_WIDTH: f64 = 0.05;
pub const DEFAULT_GAP_TOLERANCE_DAYS: u32 = 3;
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_STALE_SECS: u64 = 600;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NarrativeConfig {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
    #[serde(default)]
    pub gaps: GapConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
}

/// Composite index and smoothing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// ICCE blend weight between sentiment and conversation share
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// EMA smoothing factor
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    /// Fail a series instead of flagging its low-confidence days
    #[serde(default)]
    pub reject_low_confidence: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            lambda: DEFAULT_LAMBDA,
            reject_low_confidence: false,
        }
    }
}

/// Holt forecaster parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u32,
    #[serde(default = "default_min_history_days")]
    pub min_history_days: usize,
    #[serde(default = "default_level_smoothing")]
    pub level_smoothing: f64,
    #[serde(default = "default_trend_smoothing")]
    pub trend_smoothing: f64,
    #[serde(default = "default_z")]
    pub z: f64,
    /// Band half-width used while there are too few residuals for a deviation
    #[serde(default = "default_min_half_width")]
    pub min_half_width: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            forecast_days: DEFAULT_FORECAST_DAYS,
            min_history_days: DEFAULT_MIN_HISTORY_DAYS,
            level_smoothing: DEFAULT_LEVEL_SMOOTHING,
            trend_smoothing: DEFAULT_TREND_SMOOTHING,
            z: DEFAULT_Z,
            min_half_width: DEFAULT_MIN_HALF_WIDTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapConfig {
    /// Longest run of missing days that is interpolated instead of refused
    #[serde(default = "default_gap_tolerance_days")]
    pub tolerance_days: u32,
}

impl Default for GapConfig {
    fn default() -> Self {
        Self {
            tolerance_days: DEFAULT_GAP_TOLERANCE_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Timezone used to assign messages to calendar days ("UTC" or "+HH:MM")
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

impl AggregationConfig {
    pub fn offset(&self) -> Result<FixedOffset, ComputeError> {
        parse_utc_offset(&self.timezone)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// How long past the TTL a cached entry may still be served while it refreshes
    #[serde(default = "default_stale_secs")]
    pub stale_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            stale_secs: DEFAULT_STALE_SECS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
        }
    }
}

impl NarrativeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self, ComputeError> {
        let parsed: NarrativeConfig = toml::from_str(raw)?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ComputeError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            ComputeError::InvalidInput(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ComputeError> {
        toml::to_string_pretty(self).map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Check every parameter range
    pub fn validate(&self) -> Result<(), ComputeError> {
        unit_interval("alpha", self.index.alpha)?;
        unit_interval("lambda", self.index.lambda)?;
        unit_interval("level_smoothing", self.forecast.level_smoothing)?;
        unit_interval("trend_smoothing", self.forecast.trend_smoothing)?;

        if !(1..=MAX_FORECAST_DAYS).contains(&self.forecast.forecast_days) {
            return Err(ComputeError::invalid_parameter(
                "forecast_days",
                format!(
                    "must be in [1, {MAX_FORECAST_DAYS}], got {}",
                    self.forecast.forecast_days
                ),
            ));
        }
        if self.forecast.min_history_days == 0 {
            return Err(ComputeError::invalid_parameter(
                "min_history_days",
                "must be greater than 0",
            ));
        }
        if !self.forecast.z.is_finite() || self.forecast.z < 0.0 {
            return Err(ComputeError::invalid_parameter(
                "z",
                format!("must be a finite non-negative number, got {}", self.forecast.z),
            ));
        }
        if !(0.0..=1.0).contains(&self.forecast.min_half_width) {
            return Err(ComputeError::invalid_parameter(
                "min_half_width",
                format!("must be in [0, 1], got {}", self.forecast.min_half_width),
            ));
        }
        if self.upstream.fetch_timeout_secs == 0 {
            return Err(ComputeError::invalid_parameter(
                "fetch_timeout_secs",
                "must be greater than 0",
            ));
        }
        self.aggregation.offset()?;
        Ok(())
    }
}

fn unit_interval(name: &'static str, value: f64) -> Result<(), ComputeError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ComputeError::invalid_parameter(
            name,
            format!("must be in (0, 1], got {value}"),
        ))
    }
}

/// Parse "UTC", "Z", "+05:30", "-0600" or "+03" into a fixed offset
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset, ComputeError> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0)
            .ok_or_else(|| ComputeError::InvalidTimezone(raw.to_string()));
    }

    let invalid = || ComputeError::InvalidTimezone(raw.to_string());
    let trimmed = trimmed
        .strip_prefix("UTC")
        .or_else(|| trimmed.strip_prefix("utc"))
        .unwrap_or(trimmed);

    let (sign, rest) = match trimmed.chars().next() {
        Some('+') => (1, &trimmed[1..]),
        Some('-') => (-1, &trimmed[1..]),
        _ => return Err(invalid()),
    };

    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().map_err(|_| invalid())?, 0),
        4 => (
            digits[..2].parse::<i32>().map_err(|_| invalid())?,
            digits[2..].parse::<i32>().map_err(|_| invalid())?,
        ),
        _ => return Err(invalid()),
    };
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

fn default_alpha() -> f64 {
    DEFAULT_ALPHA
}

fn default_lambda() -> f64 {
    DEFAULT_LAMBDA
}

fn default_forecast_days() -> u32 {
    DEFAULT_FORECAST_DAYS
}

fn default_min_history_days() -> usize {
    DEFAULT_MIN_HISTORY_DAYS
}

fn default_level_smoothing() -> f64 {
    DEFAULT_LEVEL_SMOOTHING
}

fn default_trend_smoothing() -> f64 {
    DEFAULT_TREND_SMOOTHING
}

fn default_z() -> f64 {
    DEFAULT_Z
}

fn default_min_half_width() -> f64 {
    DEFAULT_MIN_HALF_WIDTH
}

fn default_gap_tolerance_days() -> u32 {
    DEFAULT_GAP_TOLERANCE_DAYS
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_stale_secs() -> u64 {
    DEFAULT_STALE_SECS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

//! Short-horizon trend forecasting
//!
//! Holt's linear-trend method over the smoothed index. The recursion state is
//! an explicit `HoltState` value threaded through each update, so fitting a
//! series never touches shared state.
//!
//! Bands widen with the square root of the horizon:
//! `half_width(h) = z * sigma * sqrt(h)`, where sigma is the sample standard
//! deviation of the one-step-ahead residuals.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::{ForecastConfig, MAX_FORECAST_DAYS};
use crate::error::ComputeError;
use crate::types::{ForecastPoint, SeriesKey};

/// Holt recursion state after consuming a prefix of the series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoltState {
    pub level: f64,
    pub trend: f64,
    /// One-step-ahead residuals `S_t - (L_{t-1} + T_{t-1})`
    pub residuals: Vec<f64>,
    /// Number of observations consumed
    pub observations: usize,
}

impl HoltState {
    /// Seed the recursion from the first observation, and the second if known
    pub fn initialize(first: f64, second: Option<f64>) -> Self {
        Self {
            level: first,
            trend: second.map_or(0.0, |s| s - first),
            residuals: Vec::new(),
            observations: 1,
        }
    }

    /// Consume the next observation
    pub fn update(self, value: f64, level_smoothing: f64, trend_smoothing: f64) -> Self {
        let predicted = self.level + self.trend;
        let level = level_smoothing * value + (1.0 - level_smoothing) * predicted;
        let trend = trend_smoothing * (level - self.level) + (1.0 - trend_smoothing) * self.trend;

        let mut residuals = self.residuals;
        residuals.push(value - predicted);

        Self {
            level,
            trend,
            residuals,
            observations: self.observations + 1,
        }
    }

    /// Unclamped projection `h` steps ahead
    pub fn project(&self, h: u32) -> f64 {
        self.level + h as f64 * self.trend
    }

    /// Sample standard deviation of the residuals, if at least two exist
    pub fn residual_std_dev(&self) -> Option<f64> {
        let n = self.residuals.len();
        if n < 2 {
            return None;
        }
        let mean = self.residuals.iter().sum::<f64>() / n as f64;
        let variance = self
            .residuals
            .iter()
            .map(|r| (r - mean).powi(2))
            .sum::<f64>()
            / (n - 1) as f64;
        Some(variance.sqrt())
    }
}

/// Holt forecaster with confidence bands
#[derive(Debug, Clone)]
pub struct TrendForecaster {
    config: ForecastConfig,
}

impl TrendForecaster {
    pub fn new(config: ForecastConfig) -> Result<Self, ComputeError> {
        for (name, value) in [
            ("level_smoothing", config.level_smoothing),
            ("trend_smoothing", config.trend_smoothing),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ComputeError::invalid_parameter(
                    name,
                    format!("must be in (0, 1], got {value}"),
                ));
            }
        }
        if !(1..=MAX_FORECAST_DAYS).contains(&config.forecast_days) {
            return Err(ComputeError::invalid_parameter(
                "forecast_days",
                format!("must be in [1, {MAX_FORECAST_DAYS}], got {}", config.forecast_days),
            ));
        }
        Ok(Self { config })
    }

    /// Minimum number of smoothed points needed to forecast
    pub fn required_history(&self) -> usize {
        self.config.min_history_days.max(2)
    }

    /// Run the recursion over a smoothed series
    pub fn fit(&self, smoothed: &[f64]) -> Result<HoltState, ComputeError> {
        let required = self.required_history();
        if smoothed.len() < required {
            return Err(ComputeError::InsufficientHistory {
                available: smoothed.len(),
                required,
            });
        }

        let state = HoltState::initialize(smoothed[0], smoothed.get(1).copied());
        Ok(smoothed[1..].iter().fold(state, |state, &value| {
            state.update(
                value,
                self.config.level_smoothing,
                self.config.trend_smoothing,
            )
        }))
    }

    /// Band half-width at horizon `h`
    pub fn half_width(&self, state: &HoltState, h: u32) -> f64 {
        if state.observations < 3 {
            return self.config.min_half_width;
        }
        let sigma = state.residual_std_dev().unwrap_or(0.0);
        self.config.z * sigma * (h as f64).sqrt()
    }

    /// Forecast `forecast_days` days after `base_date`, the date of the last point
    pub fn forecast(
        &self,
        key: &SeriesKey,
        base_date: NaiveDate,
        smoothed: &[f64],
    ) -> Result<Vec<ForecastPoint>, ComputeError> {
        let state = self.fit(smoothed)?;

        (1..=self.config.forecast_days)
            .map(|h| {
                let date = base_date.checked_add_days(Days::new(u64::from(h))).ok_or_else(|| {
                    ComputeError::InvalidInput(format!("forecast date out of range after {base_date}"))
                })?;
                let projected_value = state.project(h).clamp(0.0, 1.0);
                let half_width = self.half_width(&state, h);
                Ok(ForecastPoint {
                    entity_id: key.entity_id.clone(),
                    locale: key.locale.clone(),
                    base_date,
                    horizon_day: h,
                    date,
                    projected_value,
                    lower_bound: (projected_value - half_width).clamp(0.0, 1.0),
                    upper_bound: (projected_value + half_width).clamp(0.0, 1.0),
                })
            })
            .collect()
    }
}

impl Default for TrendForecaster {
    fn default() -> Self {
        Self {
            config: ForecastConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smoother::ExponentialSmoother;

    fn key() -> SeriesKey {
        SeriesKey::new("cand-a", "mx")
    }

    fn base_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    fn example_smoothed() -> Vec<f64> {
        ExponentialSmoother::new(0.3)
            .unwrap()
            .smooth(&[0.40, 0.44, 0.38, 0.42, 0.50, 0.46, 0.48])
    }

    #[test]
    fn test_insufficient_history() {
        let forecaster = TrendForecaster::default();
        let err = forecaster.forecast(&key(), base_date(), &[0.4]).unwrap_err();
        assert!(matches!(
            err,
            ComputeError::InsufficientHistory {
                available: 1,
                required: 2
            }
        ));
        assert!(forecaster.forecast(&key(), base_date(), &[]).is_err());
    }

    #[test]
    fn test_min_history_days_raises_requirement() {
        let config = ForecastConfig {
            min_history_days: 5,
            ..ForecastConfig::default()
        };
        let forecaster = TrendForecaster::new(config).unwrap();
        assert!(forecaster.fit(&[0.4, 0.41, 0.42, 0.43]).is_err());
        assert!(forecaster.fit(&[0.4, 0.41, 0.42, 0.43, 0.44]).is_ok());
    }

    #[test]
    fn test_holt_state_on_example_series() {
        let state = TrendForecaster::default().fit(&example_smoothed()).unwrap();

        assert_eq!(state.observations, 7);
        assert_eq!(state.residuals.len(), 6);
        assert_eq!(state.residuals[0], 0.0);
        assert!((state.level - 0.4517148).abs() < 1e-6);
        assert!((state.trend - 0.0102217).abs() < 1e-6);
        assert!((state.residual_std_dev().unwrap() - 0.0133635).abs() < 1e-6);
    }

    #[test]
    fn test_forecast_on_example_series() {
        let points = TrendForecaster::default()
            .forecast(&key(), base_date(), &example_smoothed())
            .unwrap();

        assert_eq!(points.len(), 14);
        let first = &points[0];
        assert_eq!(first.horizon_day, 1);
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 8).unwrap());
        assert!((first.projected_value - 0.4619364).abs() < 1e-6);
        assert!((first.lower_bound - 0.4485729).abs() < 1e-6);
        assert!((first.upper_bound - 0.4753000).abs() < 1e-6);

        let last = &points[13];
        assert_eq!(last.horizon_day, 14);
        assert!((last.projected_value - 0.5948181).abs() < 1e-6);

        for point in &points {
            assert!(point.lower_bound <= point.projected_value);
            assert!(point.projected_value <= point.upper_bound);
            assert_eq!(point.base_date, base_date());
        }
    }

    #[test]
    fn test_band_width_non_decreasing() {
        let points = TrendForecaster::default()
            .forecast(&key(), base_date(), &example_smoothed())
            .unwrap();

        let forecaster = TrendForecaster::default();
        let state = forecaster.fit(&example_smoothed()).unwrap();
        let mut previous = 0.0;
        for h in 1..=14 {
            let width = forecaster.half_width(&state, h);
            assert!(width >= previous);
            previous = width;
        }
        assert_eq!(points.len(), 14);
    }

    #[test]
    fn test_constant_history_projects_constant() {
        let smoothed = vec![0.42; 10];
        let forecaster = TrendForecaster::default();
        let state = forecaster.fit(&smoothed).unwrap();
        assert_eq!(state.trend, 0.0);

        let points = forecaster.forecast(&key(), base_date(), &smoothed).unwrap();
        for point in &points {
            assert!((point.projected_value - 0.42).abs() < 1e-12);
        }
    }

    #[test]
    fn test_short_history_uses_minimum_half_width() {
        let points = TrendForecaster::default()
            .forecast(&key(), base_date(), &[0.40, 0.44])
            .unwrap();

        for point in &points {
            let width = point.upper_bound - point.lower_bound;
            if point.upper_bound < 1.0 && point.lower_bound > 0.0 {
                assert!((width - 0.10).abs() < 1e-9);
            }
        }
        // L_2 = S_2 and T_2 = S_2 - S_1, so the first step continues the line
        assert!((points[0].projected_value - 0.48).abs() < 1e-9);
    }

    #[test]
    fn test_projection_is_clamped() {
        let smoothed = [0.80, 0.90, 0.99];
        let points = TrendForecaster::default()
            .forecast(&key(), base_date(), &smoothed)
            .unwrap();
        for point in &points {
            assert!(point.projected_value <= 1.0);
            assert!(point.upper_bound <= 1.0);
            assert!(point.lower_bound >= 0.0);
        }
        assert_eq!(points[13].projected_value, 1.0);
    }

    #[test]
    fn test_invalid_parameters() {
        let config = ForecastConfig {
            level_smoothing: 0.0,
            ..ForecastConfig::default()
        };
        assert!(TrendForecaster::new(config).is_err());

        let config = ForecastConfig {
            forecast_days: 0,
            ..ForecastConfig::default()
        };
        assert!(TrendForecaster::new(config).is_err());

        let config = ForecastConfig {
            forecast_days: u32::MAX,
            ..ForecastConfig::default()
        };
        assert!(TrendForecaster::new(config).is_err());
    }

    #[test]
    fn test_forecast_past_last_date_is_an_error() {
        let forecaster = TrendForecaster::default();
        let err = forecaster
            .forecast(&key(), NaiveDate::MAX, &[0.40, 0.44, 0.38])
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}

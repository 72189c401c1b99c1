//! Exponential smoothing of the raw composite index
//!
//! `S_1 = x_1`, `S_t = lambda * x_t + (1 - lambda) * S_{t-1}`. One pass over
//! the series; any change to an earlier raw value means re-running it.

use crate::error::ComputeError;

/// Exponential moving average over a chronologically ordered series
#[derive(Debug, Clone, Copy)]
pub struct ExponentialSmoother {
    lambda: f64,
}

impl ExponentialSmoother {
    /// Create a smoother with factor `lambda` in (0, 1]
    pub fn new(lambda: f64) -> Result<Self, ComputeError> {
        if !(lambda > 0.0 && lambda <= 1.0) {
            return Err(ComputeError::invalid_parameter(
                "lambda",
                format!("must be in (0, 1], got {lambda}"),
            ));
        }
        Ok(Self { lambda })
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Smooth a full series
    pub fn smooth(&self, raw: &[f64]) -> Vec<f64> {
        self.smooth_from(None, raw)
    }

    /// Continue smoothing after `previous`, the last smoothed value already known
    pub fn smooth_from(&self, previous: Option<f64>, raw: &[f64]) -> Vec<f64> {
        let mut smoothed = Vec::with_capacity(raw.len());
        let mut last = previous;
        for &value in raw {
            let next = match last {
                None => value,
                Some(prev) => self.step(prev, value),
            };
            smoothed.push(next);
            last = Some(next);
        }
        smoothed
    }

    /// One recurrence step
    pub fn step(&self, previous: f64, value: f64) -> f64 {
        self.lambda * value + (1.0 - self.lambda) * previous
    }
}

impl Default for ExponentialSmoother {
    fn default() -> Self {
        Self {
            lambda: crate::config::DEFAULT_LAMBDA,
        }
    }
}

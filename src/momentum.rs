//! Momentum of the smoothed index
//!
//! First difference of the smoothed series, `M_1 = 0`, `M_t = S_t - S_{t-1}`.

use crate::types::MomentumLabel;

pub const STRONG_THRESHOLD: f64 = 0.03;
pub const STABLE_THRESHOLD: f64 = 0.005;

pub struct MomentumTracker;

impl MomentumTracker {
    /// Momentum for every point of a smoothed series
    pub fn track(smoothed: &[f64]) -> Vec<f64> {
        let mut momentum = Vec::with_capacity(smoothed.len());
        if !smoothed.is_empty() {
            momentum.push(0.0);
        }
        momentum.extend(smoothed.windows(2).map(|pair| pair[1] - pair[0]));
        momentum
    }

    /// Classify a momentum value
    pub fn classify(momentum: f64) -> MomentumLabel {
        if momentum > STRONG_THRESHOLD {
            MomentumLabel::StrongUp
        } else if momentum > STABLE_THRESHOLD {
            MomentumLabel::Positive
        } else if momentum >= -STABLE_THRESHOLD {
            MomentumLabel::Stable
        } else if momentum >= -STRONG_THRESHOLD {
            MomentumLabel::Negative
        } else {
            MomentumLabel::StrongDown
        }
    }
}

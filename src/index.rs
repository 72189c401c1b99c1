//! Composite index computation
//!
//! Converts one day's counts into the net sentiment index (ISN), its
//! normalized form, the relative conversation index (ICR) and the composite
//! ICCE. Each day is a pure function of its own aggregate.
//!
//! - `ISN = (positive - negative) / entity_volume`
//! - `ISN_norm = (ISN + 1) / 2`
//! - `ICR = entity_volume / market_volume`
//! - `ICCE = alpha * ISN_norm + (1 - alpha) * ICR`

use tracing::warn;

use crate::error::ComputeError;
use crate::types::{DailyAggregate, DailyIndex, DayStatus, QualityFlag};

/// Engine computing the composite index for individual days
#[derive(Debug, Clone, Copy)]
pub struct IndexEngine {
    alpha: f64,
}

impl IndexEngine {
    /// Create an engine with the given ICCE blend weight, in (0, 1]
    pub fn new(alpha: f64) -> Result<Self, ComputeError> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(ComputeError::invalid_parameter(
                "alpha",
                format!("must be in (0, 1], got {alpha}"),
            ));
        }
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Compute the index values for one aggregate
    pub fn compute(&self, aggregate: &DailyAggregate) -> DailyIndex {
        let mut flags = Vec::new();

        let (positive_share, negative_share) = if aggregate.entity_volume > 0 {
            let volume = aggregate.entity_volume as f64;
            (
                aggregate.positive_count as f64 / volume,
                aggregate.negative_count as f64 / volume,
            )
        } else {
            flags.push(QualityFlag::ZeroEntityVolume);
            (0.0, 0.0)
        };

        let isn = (positive_share - negative_share).clamp(-1.0, 1.0);
        let isn_norm = normalize_signed(isn);

        let icr = if aggregate.market_volume > 0 {
            (aggregate.entity_volume as f64 / aggregate.market_volume as f64).clamp(0.0, 1.0)
        } else {
            flags.push(QualityFlag::ZeroMarketVolume);
            0.0
        };

        let icce = self.blend(isn_norm, icr);

        let status = if flags.is_empty() {
            DayStatus::Present
        } else {
            warn!(
                entity_id = %aggregate.entity_id,
                locale = %aggregate.locale,
                date = %aggregate.date,
                flags = ?flags,
                "low-confidence day"
            );
            DayStatus::LowConfidence
        };

        DailyIndex {
            date: aggregate.date,
            isn,
            isn_norm,
            icr,
            icce,
            status,
            flags,
        }
    }

    /// Blend normalized sentiment and conversation share into ICCE
    pub fn blend(&self, isn_norm: f64, icr: f64) -> f64 {
        (self.alpha * isn_norm + (1.0 - self.alpha) * icr).clamp(0.0, 1.0)
    }
}

impl Default for IndexEngine {
    fn default() -> Self {
        Self {
            alpha: crate::config::DEFAULT_ALPHA,
        }
    }
}

/// Map a value in [-1, 1] onto [0, 1]
pub fn normalize_signed(value: f64) -> f64 {
    ((value + 1.0) / 2.0).clamp(0.0, 1.0)
}

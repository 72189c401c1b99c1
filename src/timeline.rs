//! Calendar timeline and gap policy
//!
//! Lays the aggregates of one series out on consecutive calendar days. A day
//! is either present (it has an aggregate) or missing; missing is a distinct
//! variant and never a zero-filled aggregate.
//!
//! Runs of missing days no longer than the tolerance are filled by linear
//! interpolation of every index component between the neighbouring present
//! days. Longer runs refuse the series with `MissingData`.

use chrono::NaiveDate;
use tracing::warn;

use crate::error::ComputeError;
use crate::index::IndexEngine;
use crate::types::{DailyAggregate, DailyIndex, DayStatus, QualityFlag, SeriesKey};

/// One calendar day of a series
#[derive(Debug, Clone, PartialEq)]
pub enum DaySlot {
    Present(DailyAggregate),
    Missing(NaiveDate),
}

impl DaySlot {
    pub fn date(&self) -> NaiveDate {
        match self {
            DaySlot::Present(aggregate) => aggregate.date,
            DaySlot::Missing(date) => *date,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, DaySlot::Missing(_))
    }
}

/// A run of consecutive missing days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gap {
    /// Last present day before the gap
    pub after: NaiveDate,
    pub days: u32,
}

/// Day-by-day layout of one series
#[derive(Debug, Clone)]
pub struct Timeline {
    key: SeriesKey,
    slots: Vec<DaySlot>,
}

impl Timeline {
    /// Build a timeline from the aggregates of a single series
    pub fn build(key: &SeriesKey, aggregates: &[DailyAggregate]) -> Result<Self, ComputeError> {
        let mut sorted: Vec<DailyAggregate> = aggregates.to_vec();
        sorted.sort_by_key(|a| a.date);

        let mut slots: Vec<DaySlot> = Vec::with_capacity(sorted.len());
        for aggregate in sorted {
            if aggregate.entity_id != key.entity_id || aggregate.locale != key.locale {
                return Err(ComputeError::InvalidInput(format!(
                    "aggregate for {} found in series {}",
                    aggregate.key(),
                    key
                )));
            }

            if let Some(last) = slots.last() {
                let last_date = last.date();
                if aggregate.date == last_date {
                    return Err(ComputeError::InvalidInput(format!(
                        "duplicate aggregate for {} on {}",
                        key, aggregate.date
                    )));
                }
                let mut day = last_date.succ_opt();
                while let Some(missing) = day {
                    if missing >= aggregate.date {
                        break;
                    }
                    slots.push(DaySlot::Missing(missing));
                    day = missing.succ_opt();
                }
            }
            slots.push(DaySlot::Present(aggregate));
        }

        Ok(Self {
            key: key.clone(),
            slots,
        })
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn slots(&self) -> &[DaySlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Runs of consecutive missing days, in date order
    pub fn gaps(&self) -> Vec<Gap> {
        let mut gaps = Vec::new();
        let mut last_present: Option<NaiveDate> = None;
        let mut run = 0u32;

        for slot in &self.slots {
            match slot {
                DaySlot::Missing(_) => run += 1,
                DaySlot::Present(aggregate) => {
                    if run > 0 {
                        if let Some(after) = last_present {
                            gaps.push(Gap { after, days: run });
                        }
                    }
                    run = 0;
                    last_present = Some(aggregate.date);
                }
            }
        }
        gaps
    }

    /// Compute every day's index, interpolating tolerated gaps
    pub fn resolve(
        &self,
        engine: &IndexEngine,
        tolerance_days: u32,
    ) -> Result<Vec<DailyIndex>, ComputeError> {
        if let Some(gap) = self.gaps().into_iter().find(|g| g.days > tolerance_days) {
            return Err(ComputeError::MissingData {
                after: gap.after,
                missing_days: gap.days,
                tolerance: tolerance_days,
            });
        }

        let mut resolved: Vec<Option<DailyIndex>> = self
            .slots
            .iter()
            .map(|slot| match slot {
                DaySlot::Present(aggregate) => Some(engine.compute(aggregate)),
                DaySlot::Missing(_) => None,
            })
            .collect();

        let mut idx = 0;
        while idx < resolved.len() {
            if resolved[idx].is_some() {
                idx += 1;
                continue;
            }
            let mut end = idx;
            while end < resolved.len() && resolved[end].is_none() {
                end += 1;
            }
            let start = idx.saturating_sub(1);
            let neighbours = match (resolved.get(start), resolved.get(end)) {
                (Some(Some(before)), Some(Some(after))) if idx > 0 => {
                    Some((before.clone(), after.clone()))
                }
                _ => None,
            };
            let (before, after) = match neighbours {
                Some(pair) => pair,
                None => {
                    return Err(ComputeError::InvalidInput(format!(
                        "gap in {} has no present neighbour",
                        self.key
                    )))
                }
            };

            warn!(
                entity_id = %self.key.entity_id,
                locale = %self.key.locale,
                after = %before.date,
                days = end - start - 1,
                "interpolating tolerated gap"
            );

            let span = (end - start) as f64;
            for (offset, slot) in resolved.iter_mut().enumerate().take(end).skip(idx) {
                let weight = (offset - start) as f64 / span;
                *slot = Some(interpolate(&before, &after, weight, self.slots[offset].date()));
            }
            idx = end + 1;
        }

        Ok(resolved.into_iter().flatten().collect())
    }
}

fn interpolate(before: &DailyIndex, after: &DailyIndex, weight: f64, date: NaiveDate) -> DailyIndex {
    let lerp = |a: f64, b: f64| a + weight * (b - a);
    DailyIndex {
        date,
        isn: lerp(before.isn, after.isn),
        isn_norm: lerp(before.isn_norm, after.isn_norm),
        icr: lerp(before.icr, after.icr),
        icce: lerp(before.icce, after.icce),
        status: DayStatus::Missing,
        flags: vec![QualityFlag::Interpolated],
    }
}

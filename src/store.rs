//! Index store
//!
//! Keeps, per (entity, locale) series, the daily aggregates received so far
//! together with the last computed index points and forecast. Smoothed values
//! depend on the whole prefix of a series, so a new or corrected aggregate
//! drops every cached point from its date onward and the forecast of that
//! series. Earlier points and other series are never touched.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::ComputeError;
use crate::narrative::NarrativeScorer;
use crate::types::{
    AuxiliaryIndicators, DailyAggregate, DayStatus, ForecastPoint, IndexPoint, SeriesKey,
    SeriesOutput,
};

/// Cached state of one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesState {
    pub key: SeriesKey,
    aggregates: BTreeMap<NaiveDate, DailyAggregate>,
    points: Vec<IndexPoint>,
    forecast: Vec<ForecastPoint>,
    #[serde(default)]
    indicators: AuxiliaryIndicators,
    /// Earliest date whose cached point is no longer valid
    #[serde(default)]
    stale_from: Option<NaiveDate>,
    /// Bumped on every change to the aggregates
    #[serde(default)]
    revision: u64,
}

impl SeriesState {
    fn new(key: SeriesKey) -> Self {
        Self {
            key,
            aggregates: BTreeMap::new(),
            points: Vec::new(),
            forecast: Vec::new(),
            indicators: AuxiliaryIndicators::default(),
            stale_from: None,
            revision: 0,
        }
    }

    pub fn aggregates(&self) -> Vec<DailyAggregate> {
        self.aggregates.values().cloned().collect()
    }

    pub fn points(&self) -> &[IndexPoint] {
        &self.points
    }

    pub fn forecast(&self) -> &[ForecastPoint] {
        &self.forecast
    }

    pub fn indicators(&self) -> &AuxiliaryIndicators {
        &self.indicators
    }

    pub fn stale_from(&self) -> Option<NaiveDate> {
        self.stale_from
    }

    /// True when cached points are missing or out of date
    pub fn is_stale(&self) -> bool {
        self.stale_from.is_some()
    }

    /// True once at least one aggregate has been stored
    pub fn has_data(&self) -> bool {
        !self.aggregates.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Output rebuilt from the cached points, without recomputation
    pub fn cached_output(&self) -> Result<SeriesOutput, ComputeError> {
        let narrative = NarrativeScorer.resolve(&self.indicators, &self.points)?;
        Ok(SeriesOutput {
            key: self.key.clone(),
            points: self.points.clone(),
            forecast: self.forecast.clone(),
            narrative,
        })
    }

    fn invalidate_from(&mut self, date: NaiveDate) {
        // Interpolated days right before `date` were derived from the changed day
        let mut cut = self.points.partition_point(|p| p.date < date);
        while cut > 0 && self.points[cut - 1].status == DayStatus::Missing {
            cut -= 1;
        }
        let from = self.points.get(cut).map_or(date, |p| p.date.min(date));

        self.points.truncate(cut);
        self.forecast.clear();
        self.revision += 1;
        self.stale_from = Some(self.stale_from.map_or(from, |current| current.min(from)));
    }
}

/// Per-series cache of aggregates and derived points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStore {
    #[serde(with = "series_list")]
    series: BTreeMap<SeriesKey, SeriesState>,
}

/// Snapshots hold the series as a list; each state carries its own key
mod series_list {
    use super::{SeriesKey, SeriesState};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S: Serializer>(
        series: &BTreeMap<SeriesKey, SeriesState>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let states: Vec<&SeriesState> = series.values().collect();
        states.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<SeriesKey, SeriesState>, D::Error> {
        let states = Vec::<SeriesState>::deserialize(deserializer)?;
        Ok(states
            .into_iter()
            .map(|state| (state.key.clone(), state))
            .collect())
    }
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn keys(&self) -> Vec<SeriesKey> {
        self.series.keys().cloned().collect()
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&SeriesState> {
        self.series.get(key)
    }

    fn entry(&mut self, key: &SeriesKey) -> &mut SeriesState {
        self.series
            .entry(key.clone())
            .or_insert_with(|| SeriesState::new(key.clone()))
    }

    /// Insert or correct one aggregate.
    ///
    /// Returns the date from which the series was invalidated, or `None` when
    /// the aggregate was already stored unchanged.
    pub fn upsert(&mut self, aggregate: DailyAggregate) -> Option<NaiveDate> {
        let key = aggregate.key();
        let date = aggregate.date;
        let state = self.entry(&key);

        if state.aggregates.get(&date) == Some(&aggregate) {
            return None;
        }
        state.aggregates.insert(date, aggregate);
        state.invalidate_from(date);

        debug!(
            entity_id = %key.entity_id,
            locale = %key.locale,
            date = %date,
            "series invalidated"
        );
        state.stale_from
    }

    /// Insert a batch of aggregates, returning the invalidation date per touched series
    pub fn ingest<I>(&mut self, aggregates: I) -> BTreeMap<SeriesKey, NaiveDate>
    where
        I: IntoIterator<Item = DailyAggregate>,
    {
        let mut touched = BTreeMap::new();
        for aggregate in aggregates {
            let key = aggregate.key();
            if let Some(from) = self.upsert(aggregate) {
                touched
                    .entry(key)
                    .and_modify(|d: &mut NaiveDate| *d = (*d).min(from))
                    .or_insert(from);
            }
        }
        touched
    }

    /// Add the counts of a batch of message aggregates to the stored days.
    ///
    /// Unlike `ingest`, which replaces a day, this treats the batch as more
    /// messages for the days it covers. Market volume of a (locale, day) grows
    /// by the batch's market volume, and every stored series of that locale and
    /// day is updated with the new total.
    pub fn accumulate<I>(&mut self, aggregates: I) -> BTreeMap<SeriesKey, NaiveDate>
    where
        I: IntoIterator<Item = DailyAggregate>,
    {
        let aggregates: Vec<DailyAggregate> = aggregates.into_iter().collect();

        let mut batch_market: BTreeMap<(String, NaiveDate), u64> = BTreeMap::new();
        for aggregate in &aggregates {
            batch_market
                .entry((aggregate.locale.clone(), aggregate.date))
                .and_modify(|m| *m = (*m).max(aggregate.market_volume))
                .or_insert(aggregate.market_volume);
        }

        let market: BTreeMap<(String, NaiveDate), u64> = batch_market
            .into_iter()
            .map(|((locale, date), added)| {
                let prior = self.market_volume(&locale, date);
                ((locale, date), prior + added)
            })
            .collect();

        let mut merged = Vec::with_capacity(aggregates.len());
        for mut aggregate in aggregates {
            if let Some(prior) = self
                .get(&aggregate.key())
                .and_then(|state| state.aggregates.get(&aggregate.date))
            {
                aggregate.positive_count += prior.positive_count;
                aggregate.negative_count += prior.negative_count;
                aggregate.neutral_count += prior.neutral_count;
                aggregate.entity_volume += prior.entity_volume;
            }
            if let Some(total) = market.get(&(aggregate.locale.clone(), aggregate.date)) {
                aggregate.market_volume = *total;
            }
            merged.push(aggregate);
        }

        // Series of the same locale and day without new messages still see the new market
        for ((locale, date), total) in &market {
            for state in self.series.values().filter(|s| &s.key.locale == locale) {
                let Some(prior) = state.aggregates.get(date) else {
                    continue;
                };
                let in_batch = merged
                    .iter()
                    .any(|m| m.date == *date && m.key() == state.key);
                if !in_batch && prior.market_volume != *total {
                    merged.push(DailyAggregate {
                        market_volume: *total,
                        ..prior.clone()
                    });
                }
            }
        }

        self.ingest(merged)
    }

    /// Largest stored market volume of a (locale, day)
    fn market_volume(&self, locale: &str, date: NaiveDate) -> u64 {
        self.series
            .values()
            .filter(|s| s.key.locale == locale)
            .filter_map(|s| s.aggregates.get(&date))
            .map(|a| a.market_volume)
            .max()
            .unwrap_or(0)
    }

    /// Drop cached points of one series from `date` onward
    pub fn invalidate_from(&mut self, key: &SeriesKey, date: NaiveDate) {
        if let Some(state) = self.series.get_mut(key) {
            state.invalidate_from(date);
        }
    }

    /// Replace the auxiliary indicators of a series.
    ///
    /// Only the narrative score depends on them, so cached points stay valid.
    pub fn set_indicators(&mut self, key: &SeriesKey, indicators: AuxiliaryIndicators) {
        self.entry(key).indicators = indicators;
    }

    /// Store a freshly computed series and mark it current
    pub fn commit(&mut self, output: &SeriesOutput) {
        let state = self.entry(&output.key);
        state.points = output.points.clone();
        state.forecast = output.forecast.clone();
        state.stale_from = None;
    }

    /// Commit only if the series has not changed since `revision` was read.
    ///
    /// Returns false, leaving the series stale, when newer data arrived while
    /// the output was being computed.
    pub fn commit_if_current(&mut self, output: &SeriesOutput, revision: u64) -> bool {
        let current = self
            .get(&output.key)
            .is_some_and(|state| state.revision == revision);
        if current {
            self.commit(output);
        }
        current
    }

    /// Keys of series whose cached points are out of date
    pub fn stale_keys(&self) -> Vec<SeriesKey> {
        self.series
            .values()
            .filter(|s| s.is_stale())
            .map(|s| s.key.clone())
            .collect()
    }

    /// Load an index store from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the index store to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QualityFlag;
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn aggregate(entity: &str, day: u32, positive: u64) -> DailyAggregate {
        DailyAggregate {
            entity_id: entity.to_string(),
            locale: "mx".to_string(),
            date: date(day),
            positive_count: positive,
            negative_count: 2,
            neutral_count: 0,
            entity_volume: positive + 2,
            market_volume: 100,
        }
    }

    fn point(entity: &str, day: u32, status: DayStatus) -> IndexPoint {
        IndexPoint {
            entity_id: entity.to_string(),
            locale: "mx".to_string(),
            date: date(day),
            isn: 0.0,
            isn_norm: 0.5,
            icr: 0.1,
            icce_raw: 0.3,
            icce_smooth: 0.3,
            momentum: 0.0,
            status,
            flags: if status == DayStatus::Missing {
                vec![QualityFlag::Interpolated]
            } else {
                Vec::new()
            },
        }
    }

    fn output(entity: &str, days: &[(u32, DayStatus)]) -> SeriesOutput {
        let key = SeriesKey::new(entity, "mx");
        SeriesOutput {
            key: key.clone(),
            points: days.iter().map(|(d, s)| point(entity, *d, *s)).collect(),
            forecast: vec![ForecastPoint {
                entity_id: entity.to_string(),
                locale: "mx".to_string(),
                base_date: date(days.len() as u32),
                horizon_day: 1,
                date: date(days.len() as u32 + 1),
                projected_value: 0.3,
                lower_bound: 0.25,
                upper_bound: 0.35,
            }],
            narrative: None,
        }
    }

    fn present(days: std::ops::RangeInclusive<u32>) -> Vec<(u32, DayStatus)> {
        days.map(|d| (d, DayStatus::Present)).collect()
    }

    #[test]
    fn test_new_series_is_stale_until_committed() {
        let mut store = IndexStore::new();
        let touched = store.ingest(vec![aggregate("cand-a", 1, 5), aggregate("cand-a", 2, 6)]);

        let key = SeriesKey::new("cand-a", "mx");
        assert_eq!(touched.get(&key), Some(&date(1)));
        assert_eq!(store.stale_keys(), vec![key.clone()]);

        store.commit(&output("cand-a", &present(1..=2)));
        assert!(store.stale_keys().is_empty());
        assert_eq!(store.get(&key).unwrap().points().len(), 2);
    }

    #[test]
    fn test_unchanged_aggregate_is_noop() {
        let mut store = IndexStore::new();
        store.ingest(vec![aggregate("cand-a", 1, 5)]);
        store.commit(&output("cand-a", &present(1..=1)));

        assert_eq!(store.upsert(aggregate("cand-a", 1, 5)), None);
        assert!(store.stale_keys().is_empty());
    }

    #[test]
    fn test_correction_drops_later_points_of_that_series_only() {
        let mut store = IndexStore::new();
        store.ingest((1..=5).map(|d| aggregate("cand-a", d, 5)));
        store.ingest((1..=5).map(|d| aggregate("cand-b", d, 5)));
        store.commit(&output("cand-a", &present(1..=5)));
        store.commit(&output("cand-b", &present(1..=5)));
        let before_b = store.get(&SeriesKey::new("cand-b", "mx")).cloned();

        let from = store.upsert(aggregate("cand-a", 3, 9));
        assert_eq!(from, Some(date(3)));

        let a = store.get(&SeriesKey::new("cand-a", "mx")).unwrap();
        let dates: Vec<NaiveDate> = a.points().iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![date(1), date(2)]);
        assert!(a.forecast().is_empty());
        assert_eq!(a.stale_from(), Some(date(3)));

        assert_eq!(
            store.get(&SeriesKey::new("cand-b", "mx")).cloned(),
            before_b
        );
    }

    #[test]
    fn test_invalidation_reaches_back_over_interpolated_days() {
        let mut store = IndexStore::new();
        store.ingest(vec![aggregate("cand-a", 1, 5), aggregate("cand-a", 4, 5)]);
        store.commit(&output(
            "cand-a",
            &[
                (1, DayStatus::Present),
                (2, DayStatus::Missing),
                (3, DayStatus::Missing),
                (4, DayStatus::Present),
            ],
        ));

        let from = store.upsert(aggregate("cand-a", 4, 8));
        assert_eq!(from, Some(date(2)));
        let a = store.get(&SeriesKey::new("cand-a", "mx")).unwrap();
        assert_eq!(a.points().len(), 1);
    }

    #[test]
    fn test_stale_from_keeps_earliest() {
        let mut store = IndexStore::new();
        store.ingest((1..=5).map(|d| aggregate("cand-a", d, 5)));
        store.commit(&output("cand-a", &present(1..=5)));

        store.upsert(aggregate("cand-a", 2, 1));
        store.upsert(aggregate("cand-a", 4, 1));
        let key = SeriesKey::new("cand-a", "mx");
        assert_eq!(store.get(&key).unwrap().stale_from(), Some(date(2)));
        assert_eq!(store.get(&key).unwrap().aggregates().len(), 5);
    }

    #[test]
    fn test_commit_if_current_rejects_outdated_output() {
        let mut store = IndexStore::new();
        store.ingest((1..=3).map(|d| aggregate("cand-a", d, 5)));
        let key = SeriesKey::new("cand-a", "mx");
        let revision = store.get(&key).unwrap().revision();

        store.upsert(aggregate("cand-a", 4, 5));
        assert!(!store.commit_if_current(&output("cand-a", &present(1..=3)), revision));
        assert!(store.get(&key).unwrap().is_stale());

        let revision = store.get(&key).unwrap().revision();
        assert!(store.commit_if_current(&output("cand-a", &present(1..=4)), revision));
        assert!(!store.get(&key).unwrap().is_stale());
        let cached = store.get(&key).unwrap().cached_output().unwrap();
        assert_eq!(cached.points.len(), 4);
        assert_eq!(cached.narrative, None);
    }

    #[test]
    fn test_separator_in_ids_keeps_series_apart() {
        let mut store = IndexStore::new();
        let mut first = aggregate("a@b", 1, 5);
        first.locale = "c".to_string();
        let mut second = aggregate("a", 1, 7);
        second.locale = "b@c".to_string();
        store.ingest(vec![first.clone(), second.clone()]);

        assert_eq!(store.len(), 2);
        let stored = store.get(&SeriesKey::new("a@b", "c")).unwrap().aggregates();
        assert_eq!(stored, vec![first]);
        let stored = store.get(&SeriesKey::new("a", "b@c")).unwrap().aggregates();
        assert_eq!(stored, vec![second]);

        let restored = IndexStore::from_json(&store.to_json().unwrap()).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored, store);
    }

    #[test]
    fn test_accumulate_adds_to_stored_day() {
        let mut store = IndexStore::new();
        store.accumulate(vec![
            DailyAggregate {
                positive_count: 10,
                negative_count: 0,
                entity_volume: 10,
                market_volume: 14,
                ..aggregate("cand-a", 1, 0)
            },
            DailyAggregate {
                positive_count: 0,
                negative_count: 0,
                neutral_count: 4,
                entity_volume: 4,
                market_volume: 14,
                ..aggregate("cand-b", 1, 0)
            },
        ]);
        store.commit(&output("cand-a", &present(1..=1)));
        store.commit(&output("cand-b", &present(1..=1)));

        let touched = store.accumulate(vec![DailyAggregate {
            positive_count: 0,
            negative_count: 1,
            entity_volume: 1,
            market_volume: 1,
            ..aggregate("cand-a", 1, 0)
        }]);
        assert_eq!(touched.len(), 2);

        let a = &store.get(&SeriesKey::new("cand-a", "mx")).unwrap().aggregates()[0];
        assert_eq!(
            (a.positive_count, a.negative_count, a.entity_volume, a.market_volume),
            (10, 1, 11, 15)
        );
        let b = &store.get(&SeriesKey::new("cand-b", "mx")).unwrap().aggregates()[0];
        assert_eq!((b.neutral_count, b.entity_volume, b.market_volume), (4, 4, 15));
        assert_eq!(store.stale_keys().len(), 2);
    }

    #[test]
    fn test_json_roundtrip() {
        let mut store = IndexStore::new();
        store.ingest((1..=3).map(|d| aggregate("cand-a", d, 5)));
        store.commit(&output("cand-a", &present(1..=3)));
        store.set_indicators(
            &SeriesKey::new("cand-a", "mx"),
            AuxiliaryIndicators {
                cp: Some(0.4),
                nmi: Some(0.1),
                ..AuxiliaryIndicators::default()
            },
        );

        let json = store.to_json().unwrap();
        let restored = IndexStore::from_json(&json).unwrap();
        assert_eq!(restored, store);
    }
}

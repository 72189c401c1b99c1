//! Pipeline orchestration
//!
//! This module provides the public API for Narrative Flux.
//! It orchestrates the full pipeline from classified messages or daily
//! aggregates to index series, forecasts and narrative scores.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::aggregator::SignalAggregator;
use crate::config::NarrativeConfig;
use crate::encoder::ResponseEncoder;
use crate::error::{ComputeError, SeriesFailure};
use crate::forecast::TrendForecaster;
use crate::index::IndexEngine;
use crate::momentum::MomentumTracker;
use crate::narrative::NarrativeScorer;
use crate::schema::{ClassifiedMessage, InputAdapter};
use crate::smoother::ExponentialSmoother;
use crate::store::IndexStore;
use crate::timeline::Timeline;
use crate::types::{
    AuxiliaryIndicators, BatchResponse, DailyAggregate, DailyIndex, IndexPoint, SeriesKey,
    SeriesOutput,
};

/// Auxiliary indicators for one series, as supplied in a compute request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesIndicators {
    pub entity_id: String,
    pub locale: String,
    #[serde(flatten)]
    pub indicators: AuxiliaryIndicators,
}

impl SeriesIndicators {
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(&self.entity_id, &self.locale)
    }
}

/// One-shot compute request: classified messages, daily aggregates or both
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComputeRequest {
    #[serde(default)]
    pub messages: Vec<ClassifiedMessage>,
    #[serde(default)]
    pub aggregates: Vec<DailyAggregate>,
    #[serde(default)]
    pub indicators: Vec<SeriesIndicators>,
}

/// Outcome of a multi-series computation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub results: Vec<SeriesOutput>,
    pub failures: Vec<SeriesFailure>,
}

impl BatchReport {
    fn push(&mut self, key: &SeriesKey, outcome: Result<SeriesOutput, ComputeError>) {
        match outcome {
            Ok(output) => self.results.push(output),
            Err(err) => {
                warn!(
                    entity_id = %key.entity_id,
                    locale = %key.locale,
                    kind = err.kind(),
                    error = %err,
                    "series failed"
                );
                self.failures.push(SeriesFailure::new(key, &err));
            }
        }
    }

    /// Encode every successful series into the response shape
    pub fn to_response(&self, encoder: &ResponseEncoder, config: &NarrativeConfig) -> BatchResponse {
        BatchResponse {
            results: self
                .results
                .iter()
                .map(|output| encoder.encode(output, config))
                .collect(),
            failures: self.failures.clone(),
        }
    }
}

/// Compute the full output of one series.
///
/// Pipeline stages:
/// 1. Timeline - Lay the aggregates out per calendar day, interpolate tolerated gaps
/// 2. IndexEngine - Per-day ISN, ICR and ICCE
/// 3. ExponentialSmoother - Smoothed ICCE
/// 4. MomentumTracker - First difference of the smoothed series
/// 5. TrendForecaster - Holt forecast with confidence bands
/// 6. NarrativeScorer - IVN, when the indicators allow it
pub fn compute_series(
    key: &SeriesKey,
    aggregates: &[DailyAggregate],
    indicators: &AuxiliaryIndicators,
    config: &NarrativeConfig,
) -> Result<SeriesOutput, ComputeError> {
    let engine = IndexEngine::new(config.index.alpha)?;
    let smoother = ExponentialSmoother::new(config.index.lambda)?;
    let forecaster = TrendForecaster::new(config.forecast.clone())?;

    let timeline = Timeline::build(key, aggregates)?;
    let days = timeline.resolve(&engine, config.gaps.tolerance_days)?;

    if config.index.reject_low_confidence {
        if let Some(day) = days.iter().find(|d| d.is_low_confidence()) {
            return Err(ComputeError::LowConfidenceDay {
                date: day.date,
                reason: format!("{:?}", day.flags),
            });
        }
    }

    let raw: Vec<f64> = days.iter().map(|d| d.icce).collect();
    let smoothed = smoother.smooth(&raw);
    let momentum = MomentumTracker::track(&smoothed);

    let points: Vec<IndexPoint> = days
        .into_iter()
        .zip(smoothed.iter().zip(momentum.iter()))
        .map(|(day, (&icce_smooth, &momentum))| index_point(key, day, icce_smooth, momentum))
        .collect();

    let base_date = match points.last() {
        Some(point) => point.date,
        None => {
            return Err(ComputeError::InsufficientHistory {
                available: 0,
                required: forecaster.required_history(),
            })
        }
    };
    let forecast = forecaster.forecast(key, base_date, &smoothed)?;
    let narrative = NarrativeScorer.resolve(indicators, &points)?;

    debug!(
        entity_id = %key.entity_id,
        locale = %key.locale,
        days = points.len(),
        horizon = forecast.len(),
        "series computed"
    );

    Ok(SeriesOutput {
        key: key.clone(),
        points,
        forecast,
        narrative,
    })
}

fn index_point(key: &SeriesKey, day: DailyIndex, icce_smooth: f64, momentum: f64) -> IndexPoint {
    IndexPoint {
        entity_id: key.entity_id.clone(),
        locale: key.locale.clone(),
        date: day.date,
        isn: day.isn,
        isn_norm: day.isn_norm,
        icr: day.icr,
        icce_raw: day.icce,
        icce_smooth: icce_smooth.clamp(0.0, 1.0),
        momentum,
        status: day.status,
        flags: day.flags,
    }
}

/// Group aggregates by series
fn group_by_series(aggregates: Vec<DailyAggregate>) -> BTreeMap<SeriesKey, Vec<DailyAggregate>> {
    let mut grouped: BTreeMap<SeriesKey, Vec<DailyAggregate>> = BTreeMap::new();
    for aggregate in aggregates {
        grouped.entry(aggregate.key()).or_default().push(aggregate);
    }
    grouped
}

/// Compute every series found in a set of aggregates.
///
/// The configuration is checked up front; after that each series succeeds or
/// fails on its own.
pub fn aggregates_to_batch(
    aggregates: Vec<DailyAggregate>,
    indicators: &BTreeMap<SeriesKey, AuxiliaryIndicators>,
    config: &NarrativeConfig,
) -> Result<BatchReport, ComputeError> {
    config.validate()?;
    reject_invalid_aggregates(&aggregates)?;

    let mut report = BatchReport::default();
    for (key, series) in group_by_series(aggregates) {
        let aux = indicators.get(&key).copied().unwrap_or_default();
        let outcome = compute_series(&key, &series, &aux, config);
        report.push(&key, outcome);
    }
    Ok(report)
}

/// Aggregate classified messages and compute every resulting series
pub fn messages_to_batch(
    messages: &[ClassifiedMessage],
    indicators: &BTreeMap<SeriesKey, AuxiliaryIndicators>,
    config: &NarrativeConfig,
) -> Result<BatchReport, ComputeError> {
    config.validate()?;
    let aggregator = SignalAggregator::new(config.aggregation.offset()?);
    let aggregates = aggregator.aggregate(messages)?;
    aggregates_to_batch(aggregates, indicators, config)
}

/// Run a compute request and encode the batch response as JSON
pub fn compute_request_json(
    request_json: &str,
    config: &NarrativeConfig,
) -> Result<String, ComputeError> {
    let request: ComputeRequest = serde_json::from_str(request_json)?;
    config.validate()?;

    let mut aggregates = request.aggregates;
    if !request.messages.is_empty() {
        let aggregator = SignalAggregator::new(config.aggregation.offset()?);
        aggregates.extend(aggregator.aggregate(&request.messages)?);
    }
    let indicators: BTreeMap<SeriesKey, AuxiliaryIndicators> = request
        .indicators
        .iter()
        .map(|entry| (entry.key(), entry.indicators))
        .collect();

    let report = aggregates_to_batch(aggregates, &indicators, config)?;
    let response = report.to_response(&ResponseEncoder::new(), config);
    ResponseEncoder::batch_to_json(&response)
}

fn reject_invalid_aggregates(aggregates: &[DailyAggregate]) -> Result<(), ComputeError> {
    match InputAdapter::validate_aggregates(aggregates).first() {
        None => Ok(()),
        Some(failure) => Err(ComputeError::ParseError(format!(
            "Invalid aggregate at index {}: {}",
            failure.index, failure.error
        ))),
    }
}

/// Stateful processor for incremental processing with a persistent index store.
///
/// Use this when aggregates arrive over time: only series touched since the
/// last computation are recomputed, the rest are served from the store.
pub struct NarrativeProcessor {
    config: NarrativeConfig,
    store: IndexStore,
    encoder: ResponseEncoder,
}

impl Default for NarrativeProcessor {
    fn default() -> Self {
        Self {
            config: NarrativeConfig::default(),
            store: IndexStore::new(),
            encoder: ResponseEncoder::new(),
        }
    }
}

impl NarrativeProcessor {
    /// Create a processor with a validated configuration
    pub fn new(config: NarrativeConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self {
            config,
            store: IndexStore::new(),
            encoder: ResponseEncoder::new(),
        })
    }

    pub fn config(&self) -> &NarrativeConfig {
        &self.config
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn encoder(&self) -> &ResponseEncoder {
        &self.encoder
    }

    /// Load index store state from JSON
    pub fn load_store(&mut self, json: &str) -> Result<(), ComputeError> {
        self.store =
            IndexStore::from_json(json).map_err(|e| ComputeError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save index store state to JSON
    pub fn save_store(&self) -> Result<String, ComputeError> {
        self.store
            .to_json()
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Store new or corrected aggregates, returning the series they invalidated
    pub fn ingest(&mut self, aggregates: Vec<DailyAggregate>) -> Result<Vec<SeriesKey>, ComputeError> {
        reject_invalid_aggregates(&aggregates)?;
        Ok(self.store.ingest(aggregates).into_keys().collect())
    }

    /// Aggregate classified messages and add them to the stored days.
    ///
    /// Batches are cumulative: messages arriving late for a day that was
    /// already ingested are added to that day's counts, not substituted.
    pub fn ingest_messages(
        &mut self,
        messages: &[ClassifiedMessage],
    ) -> Result<Vec<SeriesKey>, ComputeError> {
        let aggregator = SignalAggregator::new(self.config.aggregation.offset()?);
        let aggregates = aggregator.aggregate(messages)?;
        Ok(self.store.accumulate(aggregates).into_keys().collect())
    }

    pub fn set_indicators(&mut self, key: &SeriesKey, indicators: AuxiliaryIndicators) {
        self.store.set_indicators(key, indicators);
    }

    /// Output of one series, recomputing it if the store holds stale points
    pub fn series(&mut self, key: &SeriesKey) -> Result<SeriesOutput, ComputeError> {
        let state = self
            .store
            .get(key)
            .filter(|s| s.has_data())
            .ok_or_else(|| ComputeError::InvalidInput(format!("no aggregates for series {key}")))?;

        if !state.is_stale() {
            debug!(entity_id = %key.entity_id, locale = %key.locale, "serving cached series");
            return state.cached_output();
        }

        let output = compute_series(key, &state.aggregates(), state.indicators(), &self.config)?;
        self.store.commit(&output);
        Ok(output)
    }

    /// Output of every stored series; failures are reported per series
    pub fn process_batch(&mut self) -> BatchReport {
        let mut report = BatchReport::default();
        for key in self.store.keys() {
            let outcome = self.series(&key);
            report.push(&key, outcome);
        }
        report
    }

    /// Process every stored series and encode the batch response
    pub fn process_to_json(&mut self) -> Result<String, ComputeError> {
        let report = self.process_batch();
        let response = report.to_response(&self.encoder, &self.config);
        ResponseEncoder::batch_to_json(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayStatus, QualityFlag, Sentiment};
    use chrono::{NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    /// Balanced sentiment, so ICCE = 0.25 + 0.5 * entity_volume / 100
    fn balanced(entity: &str, day: u32, entity_volume: u64) -> DailyAggregate {
        DailyAggregate {
            entity_id: entity.to_string(),
            locale: "mx".to_string(),
            date: date(day),
            positive_count: entity_volume / 2,
            negative_count: entity_volume / 2,
            neutral_count: 0,
            entity_volume,
            market_volume: 100,
        }
    }

    /// Raw ICCE 0.40, 0.44, 0.38, 0.42, 0.50, 0.46, 0.48
    fn worked_series(entity: &str) -> Vec<DailyAggregate> {
        [30, 38, 26, 34, 50, 42, 46]
            .iter()
            .enumerate()
            .map(|(i, &volume)| balanced(entity, i as u32 + 1, volume))
            .collect()
    }

    fn key(entity: &str) -> SeriesKey {
        SeriesKey::new(entity, "mx")
    }

    #[test]
    fn test_compute_series_worked_example() {
        let output = compute_series(
            &key("cand-a"),
            &worked_series("cand-a"),
            &AuxiliaryIndicators::default(),
            &NarrativeConfig::default(),
        )
        .unwrap();

        let smooth: Vec<f64> = output.points.iter().map(|p| p.icce_smooth).collect();
        let expected = [0.4000, 0.4120, 0.4024, 0.40768, 0.43538, 0.44276, 0.45393];
        for (got, want) in smooth.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-3);
        }
        assert_eq!(output.points[0].momentum, 0.0);
        assert!((output.points[4].momentum - 0.0277).abs() < 1e-3);

        assert_eq!(output.forecast.len(), 14);
        assert_eq!(output.forecast[0].base_date, date(7));
        assert_eq!(output.forecast[0].date, date(8));
        assert!((output.forecast[0].projected_value - 0.4619364).abs() < 1e-6);
        assert!(output.narrative.is_none());
    }

    #[test]
    fn test_deterministic_output() {
        let config = NarrativeConfig::default();
        let aux = AuxiliaryIndicators {
            cp: Some(0.5),
            nmi: Some(0.1),
            ..AuxiliaryIndicators::default()
        };
        let first = compute_series(&key("cand-a"), &worked_series("cand-a"), &aux, &config).unwrap();
        let second = compute_series(&key("cand-a"), &worked_series("cand-a"), &aux, &config).unwrap();
        assert_eq!(first, second);

        let encoder = ResponseEncoder::with_instance_id("fixed".to_string());
        let at = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();
        let a = serde_json::to_string(&encoder.encode_at(&first, &config, at)).unwrap();
        let b = serde_json::to_string(&encoder.encode_at(&second, &config, at)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_narrative_uses_series_fallbacks() {
        let aux = AuxiliaryIndicators {
            cp: Some(0.5),
            nmi: Some(0.0),
            ..AuxiliaryIndicators::default()
        };
        let output = compute_series(
            &key("cand-a"),
            &worked_series("cand-a"),
            &aux,
            &NarrativeConfig::default(),
        )
        .unwrap();

        let score = output.narrative.unwrap();
        assert!((score.sve - 0.46).abs() < 1e-12);
        assert_eq!(score.sna, 0.0);
        assert_eq!(score.as_of_date, date(7));
    }

    #[test]
    fn test_single_day_is_insufficient() {
        let err = compute_series(
            &key("cand-a"),
            &[balanced("cand-a", 1, 30)],
            &AuxiliaryIndicators::default(),
            &NarrativeConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "insufficient_history");

        let err = compute_series(
            &key("cand-a"),
            &[],
            &AuxiliaryIndicators::default(),
            &NarrativeConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "insufficient_history");
    }

    #[test]
    fn test_reject_low_confidence() {
        let mut series = worked_series("cand-a");
        series[2].market_volume = 0;
        series[2].entity_volume = 0;
        series[2].positive_count = 0;
        series[2].negative_count = 0;

        let output = compute_series(
            &key("cand-a"),
            &series,
            &AuxiliaryIndicators::default(),
            &NarrativeConfig::default(),
        )
        .unwrap();
        assert_eq!(output.points[2].status, DayStatus::LowConfidence);
        assert_eq!(output.points[2].icr, 0.0);

        let mut config = NarrativeConfig::default();
        config.index.reject_low_confidence = true;
        let err = compute_series(&key("cand-a"), &series, &AuxiliaryIndicators::default(), &config)
            .unwrap_err();
        match err {
            ComputeError::LowConfidenceDay { date: day, .. } => assert_eq!(day, date(3)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut aggregates = worked_series("cand-a");
        // cand-b has a five-day hole
        aggregates.push(balanced("cand-b", 1, 30));
        aggregates.push(balanced("cand-b", 7, 30));
        aggregates.extend(worked_series("cand-c"));

        let report =
            aggregates_to_batch(aggregates, &BTreeMap::new(), &NarrativeConfig::default()).unwrap();

        let ok: Vec<String> = report.results.iter().map(|o| o.key.entity_id.clone()).collect();
        assert_eq!(ok, vec!["cand-a".to_string(), "cand-c".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].entity_id, "cand-b");
        assert_eq!(report.failures[0].kind, "missing_data");
    }

    #[test]
    fn test_batch_rejects_invalid_config() {
        let mut config = NarrativeConfig::default();
        config.index.alpha = 1.5;
        let err = aggregates_to_batch(worked_series("cand-a"), &BTreeMap::new(), &config)
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_parameter");
    }

    #[test]
    fn test_messages_to_batch() {
        let mut messages = Vec::new();
        for day in 1..=3 {
            let ts = Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap();
            messages.push(ClassifiedMessage::new(ts, "cand-a", "mx", Sentiment::Positive));
            messages.push(ClassifiedMessage::new(ts, "cand-a", "mx", Sentiment::Negative));
            messages.push(ClassifiedMessage::new(ts, "cand-b", "mx", Sentiment::Neutral));
            messages.push(ClassifiedMessage::new(ts, "cand-b", "mx", Sentiment::Neutral));
        }

        let report =
            messages_to_batch(&messages, &BTreeMap::new(), &NarrativeConfig::default()).unwrap();
        assert!(report.failures.is_empty());
        assert_eq!(report.results.len(), 2);

        let a = &report.results[0];
        assert_eq!(a.key, key("cand-a"));
        // ISN 0 and half the locale's conversation
        assert!((a.points[0].icce_raw - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_processor_late_messages_add_to_flushed_day() {
        let mut processor = NarrativeProcessor::default();
        let day1 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();

        let first: Vec<ClassifiedMessage> = (0..10)
            .map(|_| ClassifiedMessage::new(day1, "cand-a", "mx", Sentiment::Positive))
            .collect();
        processor.ingest_messages(&first).unwrap();
        processor
            .ingest_messages(&[ClassifiedMessage::new(day2, "cand-a", "mx", Sentiment::Positive)])
            .unwrap();
        processor.process_batch();

        let touched = processor
            .ingest_messages(&[ClassifiedMessage::new(day1, "cand-a", "mx", Sentiment::Negative)])
            .unwrap();
        assert_eq!(touched, vec![key("cand-a")]);

        let stored = processor.store().get(&key("cand-a")).unwrap().aggregates();
        let day1_counts = (
            stored[0].positive_count,
            stored[0].negative_count,
            stored[0].entity_volume,
            stored[0].market_volume,
        );
        assert_eq!(day1_counts, (10, 1, 11, 11));
        assert_eq!(stored[1].entity_volume, 1);

        let output = processor.series(&key("cand-a")).unwrap();
        // ISN = (10 - 1) / 11
        assert!((output.points[0].isn - 9.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn test_compute_request_json() {
        let request = serde_json::json!({
            "aggregates": worked_series("cand-a"),
            "indicators": [
                {"entity_id": "cand-a", "locale": "mx", "sve": 0.65, "sna": 0.3, "cp": 0.65, "nmi": 0.3}
            ]
        });
        let json = compute_request_json(&request.to_string(), &NarrativeConfig::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let result = &value["results"][0];
        assert_eq!(result["entity_id"], "cand-a");
        assert_eq!(result["series"]["dates"].as_array().unwrap().len(), 7);
        assert_eq!(result["forecast"]["dates"].as_array().unwrap().len(), 14);
        assert_eq!(result["narrative"]["ivn"]["risk_level"], "low-medium");
        assert!(value["failures"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_processor_recomputes_only_from_correction() {
        let mut processor = NarrativeProcessor::default();
        processor.ingest(worked_series("cand-a")).unwrap();
        processor.ingest(worked_series("cand-b")).unwrap();
        let before = processor.process_batch();
        assert_eq!(before.results.len(), 2);

        let touched = processor.ingest(vec![balanced("cand-a", 5, 20)]).unwrap();
        assert_eq!(touched, vec![key("cand-a")]);

        let state = processor.store().get(&key("cand-a")).unwrap();
        assert_eq!(state.points().len(), 4);
        assert!(state.forecast().is_empty());
        assert!(!processor.store().get(&key("cand-b")).unwrap().is_stale());

        let after = processor.process_batch();
        let old_a = &before.results[0];
        let new_a = &after.results[0];
        assert_eq!(&old_a.points[..4], &new_a.points[..4]);
        assert_ne!(old_a.points[4], new_a.points[4]);
        assert_eq!(before.results[1], after.results[1]);

        let mut series = worked_series("cand-a");
        series[4] = balanced("cand-a", 5, 20);
        let fresh = compute_series(
            &key("cand-a"),
            &series,
            &AuxiliaryIndicators::default(),
            &NarrativeConfig::default(),
        )
        .unwrap();
        assert_eq!(new_a, &fresh);
    }

    #[test]
    fn test_processor_store_roundtrip() {
        let mut processor = NarrativeProcessor::default();
        processor.ingest(worked_series("cand-a")).unwrap();
        processor.process_batch();
        let saved = processor.save_store().unwrap();

        let mut restored = NarrativeProcessor::default();
        restored.load_store(&saved).unwrap();
        assert!(restored.store().stale_keys().is_empty());

        restored.ingest(vec![balanced("cand-a", 8, 40)]).unwrap();
        let report = restored.process_batch();
        assert_eq!(report.results[0].points.len(), 8);
    }

    #[test]
    fn test_processor_failed_series_stays_stale() {
        let mut processor = NarrativeProcessor::default();
        processor.ingest(vec![balanced("cand-a", 1, 30)]).unwrap();
        let report = processor.process_batch();
        assert!(report.results.is_empty());
        assert_eq!(report.failures[0].kind, "insufficient_history");
        assert_eq!(processor.store().stale_keys(), vec![key("cand-a")]);
    }

    #[test]
    fn test_processor_interpolated_gap_flags() {
        let mut processor = NarrativeProcessor::default();
        processor
            .ingest(vec![balanced("cand-a", 1, 30), balanced("cand-a", 3, 50)])
            .unwrap();
        let report = processor.process_batch();
        let points = &report.results[0].points;
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].flags, vec![QualityFlag::Interpolated]);
        assert!((points[1].icce_raw - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_ingest_rejects_invalid_aggregate() {
        let mut processor = NarrativeProcessor::default();
        let mut bad = balanced("cand-a", 1, 30);
        bad.market_volume = 10;
        assert!(processor.ingest(vec![bad]).is_err());
        assert!(processor.store().is_empty());
    }
}

//! Response encoding
//!
//! This module turns a computed series into the exposed response payload:
//! column-oriented series and forecast blocks, the optional narrative block,
//! the parameters used, quality counters and producer metadata.

use crate::config::NarrativeConfig;
use crate::error::ComputeError;
use crate::momentum::MomentumTracker;
use crate::types::{
    BatchResponse, DayStatus, ForecastBlock, IcceBucket, IvnBlock, NarrativeBlock,
    NarrativeResponse, NarrativeScore, ParametersBlock, ProducerBlock, QualityBlock,
    QualityFlag, SeriesBlock, SeriesOutput,
};
use crate::{NARRATIVE_VERSION, PRODUCER_NAME};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Encoder producing response payloads
pub struct ResponseEncoder {
    instance_id: String,
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode a computed series, stamped with the current time
    pub fn encode(&self, output: &SeriesOutput, config: &NarrativeConfig) -> NarrativeResponse {
        self.encode_at(output, config, Utc::now())
    }

    /// Encode a computed series with an explicit computation timestamp
    pub fn encode_at(
        &self,
        output: &SeriesOutput,
        config: &NarrativeConfig,
        computed_at: DateTime<Utc>,
    ) -> NarrativeResponse {
        NarrativeResponse {
            entity_id: output.key.entity_id.clone(),
            locale: output.key.locale.clone(),
            series: build_series(output),
            forecast: build_forecast(output),
            narrative: output.narrative.as_ref().map(build_narrative),
            parameters: ParametersBlock {
                alpha: config.index.alpha,
                lambda: config.index.lambda,
                forecast_days: config.forecast.forecast_days,
            },
            quality: build_quality(output),
            producer: ProducerBlock {
                name: PRODUCER_NAME.to_string(),
                version: NARRATIVE_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
                computed_at_utc: computed_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            },
        }
    }

    /// Encode to a compact JSON string
    pub fn encode_to_json(
        &self,
        output: &SeriesOutput,
        config: &NarrativeConfig,
    ) -> Result<String, ComputeError> {
        let response = self.encode(output, config);
        serde_json::to_string(&response).map_err(ComputeError::JsonError)
    }

    /// Encode a batch report to a compact JSON string
    pub fn batch_to_json(batch: &BatchResponse) -> Result<String, ComputeError> {
        serde_json::to_string(batch).map_err(ComputeError::JsonError)
    }
}

fn build_series(output: &SeriesOutput) -> SeriesBlock {
    let mut block = SeriesBlock::default();
    for point in &output.points {
        block.dates.push(point.date);
        block.icce.push(point.icce_raw);
        block.icce_smooth.push(point.icce_smooth);
        block.momentum.push(point.momentum);
    }
    block
}

fn build_forecast(output: &SeriesOutput) -> ForecastBlock {
    let mut block = ForecastBlock::default();
    for point in &output.forecast {
        block.dates.push(point.date);
        block.icce_pred.push(point.projected_value);
        block.pred_low.push(point.lower_bound);
        block.pred_high.push(point.upper_bound);
    }
    block
}

fn build_narrative(score: &NarrativeScore) -> NarrativeBlock {
    NarrativeBlock {
        sve: score.sve,
        sna: score.sna,
        cp: score.cp,
        nmi: score.nmi,
        ivn: IvnBlock {
            value: score.ivn,
            risk_level: score.risk_level,
            label: score.label.clone(),
        },
    }
}

fn build_quality(output: &SeriesOutput) -> QualityBlock {
    let low_confidence_days = output
        .points
        .iter()
        .filter(|p| p.status == DayStatus::LowConfidence)
        .count();
    let interpolated_days = output
        .points
        .iter()
        .filter(|p| p.flags.contains(&QualityFlag::Interpolated))
        .count();
    let latest = output.points.last();

    QualityBlock {
        low_confidence_days,
        interpolated_days,
        momentum_label: latest.map(|p| MomentumTracker::classify(p.momentum)),
        icce_bucket: latest.map(|p| IcceBucket::from_icce(p.icce_smooth)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ForecastPoint, IndexPoint, MomentumLabel, RiskLevel, SeriesKey};
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn sample_output() -> SeriesOutput {
        let key = SeriesKey::new("cand-a", "mx");
        let point = |day: u32, raw: f64, smooth: f64, momentum: f64, status: DayStatus| IndexPoint {
            entity_id: "cand-a".to_string(),
            locale: "mx".to_string(),
            date: date(day),
            isn: 0.1,
            isn_norm: 0.55,
            icr: 0.2,
            icce_raw: raw,
            icce_smooth: smooth,
            momentum,
            status,
            flags: match status {
                DayStatus::Missing => vec![QualityFlag::Interpolated],
                DayStatus::LowConfidence => vec![QualityFlag::ZeroMarketVolume],
                DayStatus::Present => Vec::new(),
            },
        };
        SeriesOutput {
            key,
            points: vec![
                point(1, 0.40, 0.40, 0.0, DayStatus::Present),
                point(2, 0.44, 0.412, 0.012, DayStatus::Missing),
                point(3, 0.38, 0.4024, -0.0096, DayStatus::LowConfidence),
            ],
            forecast: vec![ForecastPoint {
                entity_id: "cand-a".to_string(),
                locale: "mx".to_string(),
                base_date: date(3),
                horizon_day: 1,
                date: date(4),
                projected_value: 0.41,
                lower_bound: 0.36,
                upper_bound: 0.46,
            }],
            narrative: Some(NarrativeScore {
                entity_id: "cand-a".to_string(),
                locale: "mx".to_string(),
                as_of_date: date(3),
                sve: 0.65,
                sna: 0.3,
                cp: 0.65,
                nmi: 0.3,
                ivn: 0.65,
                risk_level: RiskLevel::LowMedium,
                label: "competitive, positive bias".to_string(),
            }),
        }
    }

    #[test]
    fn test_encode_blocks() {
        let encoder = ResponseEncoder::with_instance_id("test-instance".to_string());
        let computed_at = Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap();
        let response = encoder.encode_at(&sample_output(), &NarrativeConfig::default(), computed_at);

        assert_eq!(response.series.dates, vec![date(1), date(2), date(3)]);
        assert_eq!(response.series.icce, vec![0.40, 0.44, 0.38]);
        assert_eq!(response.forecast.icce_pred, vec![0.41]);
        assert_eq!(response.forecast.pred_low, vec![0.36]);
        assert_eq!(response.parameters.alpha, 0.5);
        assert_eq!(response.parameters.lambda, 0.3);
        assert_eq!(response.parameters.forecast_days, 14);
        assert_eq!(response.quality.low_confidence_days, 1);
        assert_eq!(response.quality.interpolated_days, 1);
        assert_eq!(response.quality.momentum_label, Some(MomentumLabel::Negative));
        assert_eq!(response.quality.icce_bucket, Some(IcceBucket::Weak));
        assert_eq!(response.producer.name, "narrative-flux");
        assert_eq!(response.producer.instance_id, "test-instance");
        assert_eq!(response.producer.computed_at_utc, "2024-03-04T06:00:00Z");
    }

    #[test]
    fn test_json_shape() {
        let encoder = ResponseEncoder::new();
        let json = encoder
            .encode_to_json(&sample_output(), &NarrativeConfig::default())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["series"]["dates"][0], "2024-03-01");
        assert_eq!(value["forecast"]["pred_high"][0], 0.46);
        assert_eq!(value["narrative"]["ivn"]["risk_level"], "low-medium");
        assert_eq!(value["narrative"]["ivn"]["label"], "competitive, positive bias");
        assert_eq!(value["quality"]["momentum_label"], "negative");
        assert!(Uuid::parse_str(value["producer"]["instance_id"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_missing_narrative_is_null() {
        let mut output = sample_output();
        output.narrative = None;
        let json = ResponseEncoder::new()
            .encode_to_json(&output, &NarrativeConfig::default())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["narrative"].is_null());
    }
}

//! Core types for the Narrative Flux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: daily aggregates, per-day index values, index points, forecast
//! points, narrative scores and the response payload.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one series: a tracked entity within a locale
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub entity_id: String,
    pub locale: String,
}

impl SeriesKey {
    pub fn new(entity_id: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            locale: locale.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.entity_id, self.locale)
    }
}

/// Sentiment label assigned by the upstream classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }
}

/// Daily message counts for one entity in one locale.
///
/// `market_volume` counts messages across all tracked entities for the same
/// locale and day, so `entity_volume <= market_volume`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub entity_id: String,
    pub locale: String,
    pub date: NaiveDate,
    pub positive_count: u64,
    pub negative_count: u64,
    pub neutral_count: u64,
    pub entity_volume: u64,
    pub market_volume: u64,
}

impl DailyAggregate {
    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(&self.entity_id, &self.locale)
    }
}

/// Quality flag attached to a computed day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    /// No messages attributed to the entity; sentiment balance is neutral by definition
    ZeroEntityVolume,
    /// No tracked conversation in the locale; conversation share is zero by definition
    ZeroMarketVolume,
    /// Values were interpolated across a tolerated gap
    Interpolated,
}

/// Tagged state of one calendar day in a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Present,
    LowConfidence,
    Missing,
}

/// Index values for a single day, before smoothing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyIndex {
    pub date: NaiveDate,
    /// Net sentiment, -1 to 1
    pub isn: f64,
    /// Net sentiment normalized to 0-1
    pub isn_norm: f64,
    /// Share of tracked conversation, 0-1
    pub icr: f64,
    /// Composite index, 0-1
    pub icce: f64,
    pub status: DayStatus,
    pub flags: Vec<QualityFlag>,
}

impl DailyIndex {
    pub fn is_low_confidence(&self) -> bool {
        self.status == DayStatus::LowConfidence
    }
}

/// Fully derived point of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    pub entity_id: String,
    pub locale: String,
    pub date: NaiveDate,
    pub isn: f64,
    pub isn_norm: f64,
    pub icr: f64,
    pub icce_raw: f64,
    pub icce_smooth: f64,
    pub momentum: f64,
    pub status: DayStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<QualityFlag>,
}

/// Projected index value with its confidence band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub entity_id: String,
    pub locale: String,
    pub base_date: NaiveDate,
    pub horizon_day: u32,
    pub date: NaiveDate,
    pub projected_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// Display bucket for the composite index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IcceBucket {
    #[serde(rename = "dominant")]
    Dominant,
    #[serde(rename = "competitive/stable")]
    CompetitiveStable,
    #[serde(rename = "weak")]
    Weak,
    #[serde(rename = "crisis")]
    Crisis,
}

impl IcceBucket {
    /// Bucket for an index value in [0, 1]
    pub fn from_icce(icce: f64) -> Self {
        let pct = icce * 100.0;
        if pct >= 70.0 {
            IcceBucket::Dominant
        } else if pct >= 50.0 {
            IcceBucket::CompetitiveStable
        } else if pct >= 30.0 {
            IcceBucket::Weak
        } else {
            IcceBucket::Crisis
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IcceBucket::Dominant => "dominant",
            IcceBucket::CompetitiveStable => "competitive/stable",
            IcceBucket::Weak => "weak",
            IcceBucket::Crisis => "crisis",
        }
    }
}

/// Direction of the smoothed index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomentumLabel {
    #[serde(rename = "strong up")]
    StrongUp,
    #[serde(rename = "positive")]
    Positive,
    #[serde(rename = "stable")]
    Stable,
    #[serde(rename = "negative")]
    Negative,
    #[serde(rename = "strong down")]
    StrongDown,
}

impl MomentumLabel {
    pub fn label(&self) -> &'static str {
        match self {
            MomentumLabel::StrongUp => "strong up",
            MomentumLabel::Positive => "positive",
            MomentumLabel::Stable => "stable",
            MomentumLabel::Negative => "negative",
            MomentumLabel::StrongDown => "strong down",
        }
    }
}

/// Risk grade attached to a narrative score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "low-medium")]
    LowMedium,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "medium-high")]
    MediumHigh,
    #[serde(rename = "high")]
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::LowMedium => "low-medium",
            RiskLevel::Medium => "medium",
            RiskLevel::MediumHigh => "medium-high",
            RiskLevel::High => "high",
        }
    }
}

/// Indicators supplied by the narrative-analysis collaborator.
///
/// Any of them may be absent; see `NarrativeScorer::resolve`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryIndicators {
    /// Share of voice, 0-1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sve: Option<f64>,
    /// Net narrative sentiment, -1 to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sna: Option<f64>,
    /// Comparative preference, 0-1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cp: Option<f64>,
    /// Motivational tone, -1 to 1
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nmi: Option<f64>,
}

/// Risk-graded narrative composite for one series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeScore {
    pub entity_id: String,
    pub locale: String,
    pub as_of_date: NaiveDate,
    pub sve: f64,
    pub sna: f64,
    pub cp: f64,
    pub nmi: f64,
    pub ivn: f64,
    pub risk_level: RiskLevel,
    pub label: String,
}

/// Fully computed series: index points, forecast and optional narrative score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesOutput {
    pub key: SeriesKey,
    pub points: Vec<IndexPoint>,
    pub forecast: Vec<ForecastPoint>,
    pub narrative: Option<NarrativeScore>,
}

/// Response `series` member
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesBlock {
    pub dates: Vec<NaiveDate>,
    pub icce: Vec<f64>,
    pub icce_smooth: Vec<f64>,
    pub momentum: Vec<f64>,
}

/// Response `forecast` member
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastBlock {
    pub dates: Vec<NaiveDate>,
    pub icce_pred: Vec<f64>,
    pub pred_low: Vec<f64>,
    pub pred_high: Vec<f64>,
}

/// Response `narrative.ivn` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IvnBlock {
    pub value: f64,
    pub risk_level: RiskLevel,
    pub label: String,
}

/// Response `narrative` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeBlock {
    pub sve: f64,
    pub sna: f64,
    pub cp: f64,
    pub nmi: f64,
    pub ivn: IvnBlock,
}

/// Response `parameters` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParametersBlock {
    pub alpha: f64,
    pub lambda: f64,
    pub forecast_days: u32,
}

/// Response `quality` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityBlock {
    pub low_confidence_days: usize,
    pub interpolated_days: usize,
    pub momentum_label: Option<MomentumLabel>,
    pub icce_bucket: Option<IcceBucket>,
}

/// Response `producer` member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerBlock {
    pub name: String,
    pub version: String,
    pub instance_id: String,
    pub computed_at_utc: String,
}

/// Response payload for one (entity, locale) query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeResponse {
    pub entity_id: String,
    pub locale: String,
    pub series: SeriesBlock,
    pub forecast: ForecastBlock,
    pub narrative: Option<NarrativeBlock>,
    pub parameters: ParametersBlock,
    pub quality: QualityBlock,
    pub producer: ProducerBlock,
}

/// Response payload for a multi-series batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<NarrativeResponse>,
    pub failures: Vec<crate::error::SeriesFailure>,
}

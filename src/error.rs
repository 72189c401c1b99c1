//! Error types for Narrative Flux

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SeriesKey;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration TOML: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Missing data: {missing_days} consecutive day(s) without aggregates after {after} (tolerance {tolerance})")]
    MissingData {
        after: NaiveDate,
        missing_days: u32,
        tolerance: u32,
    },

    #[error("Low-confidence day {date} rejected: {reason}")]
    LowConfidenceDay { date: NaiveDate, reason: String },

    #[error("Insufficient history: {available} point(s), at least {required} required")]
    InsufficientHistory { available: usize, required: usize },

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Upstream fetch timed out after {0} s")]
    UpstreamTimeout(u64),

    #[error("Upstream error: {0}")]
    UpstreamError(String),
}

impl ComputeError {
    /// Stable machine-readable code for this error
    pub fn kind(&self) -> &'static str {
        match self {
            ComputeError::ParseError(_) => "parse_error",
            ComputeError::JsonError(_) => "json_error",
            ComputeError::ConfigError(_) => "config_error",
            ComputeError::InvalidInput(_) => "invalid_input",
            ComputeError::InvalidTimezone(_) => "invalid_timezone",
            ComputeError::InvalidParameter { .. } => "invalid_parameter",
            ComputeError::MissingData { .. } => "missing_data",
            ComputeError::LowConfidenceDay { .. } => "low_confidence_day",
            ComputeError::InsufficientHistory { .. } => "insufficient_history",
            ComputeError::EncodingError(_) => "encoding_error",
            ComputeError::UpstreamTimeout(_) => "upstream_timeout",
            ComputeError::UpstreamError(_) => "upstream_error",
        }
    }

    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        ComputeError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// A failed series inside a multi-series batch.
///
/// Unlike `ComputeError` this is cloneable, so one failure can be handed to
/// every caller that joined the same in-flight computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFailure {
    pub entity_id: String,
    pub locale: String,
    pub kind: String,
    pub message: String,
}

impl SeriesFailure {
    pub fn new(key: &SeriesKey, err: &ComputeError) -> Self {
        Self {
            entity_id: key.entity_id.clone(),
            locale: key.locale.clone(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(&self.entity_id, &self.locale)
    }
}

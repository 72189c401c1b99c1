//! narrative.message.v1 schema definition
//!
//! One record per classified message: when it was posted, which tracked entity
//! it is attributed to, the locale it belongs to and the sentiment assigned by
//! the upstream classifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{DailyAggregate, Sentiment, SeriesKey};

/// Current schema version
pub const SCHEMA_VERSION: &str = "narrative.message.v1";

/// A classified social-signal message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedMessage {
    /// Schema version (defaults to the current version when omitted)
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Upstream message identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// When the message was posted (UTC)
    pub timestamp: DateTime<Utc>,
    /// Tracked entity the message is attributed to
    pub entity_id: String,
    /// Locale the message belongs to
    pub locale: String,
    /// Classifier output
    pub sentiment: Sentiment,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl ClassifiedMessage {
    pub fn new(
        timestamp: DateTime<Utc>,
        entity_id: impl Into<String>,
        locale: impl Into<String>,
        sentiment: Sentiment,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            message_id: None,
            timestamp,
            entity_id: entity_id.into(),
            locale: locale.into(),
            sentiment,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(&self.entity_id, &self.locale)
    }

    /// Validate the message against the schema
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(ValidationError::InvalidSchemaVersion {
                expected: SCHEMA_VERSION.to_string(),
                actual: self.schema_version.clone(),
            });
        }
        if self.entity_id.trim().is_empty() {
            return Err(ValidationError::EmptyField("entity_id"));
        }
        if self.locale.trim().is_empty() {
            return Err(ValidationError::EmptyField("locale"));
        }
        Ok(())
    }
}

/// Validate a pre-aggregated daily record
pub fn validate_aggregate(aggregate: &DailyAggregate) -> Result<(), ValidationError> {
    if aggregate.entity_id.trim().is_empty() {
        return Err(ValidationError::EmptyField("entity_id"));
    }
    if aggregate.locale.trim().is_empty() {
        return Err(ValidationError::EmptyField("locale"));
    }
    if aggregate.entity_volume > aggregate.market_volume {
        return Err(ValidationError::EntityVolumeExceedsMarket {
            entity_volume: aggregate.entity_volume,
            market_volume: aggregate.market_volume,
        });
    }
    let labelled = aggregate
        .positive_count
        .saturating_add(aggregate.negative_count)
        .saturating_add(aggregate.neutral_count);
    if labelled > aggregate.entity_volume {
        return Err(ValidationError::LabelledExceedsVolume {
            labelled,
            entity_volume: aggregate.entity_volume,
        });
    }
    Ok(())
}

/// Validation errors for input records
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid schema version: expected {expected}, got {actual}")]
    InvalidSchemaVersion { expected: String, actual: String },

    #[error("Field {0} must not be empty")]
    EmptyField(&'static str),

    #[error("entity_volume {entity_volume} exceeds market_volume {market_volume}")]
    EntityVolumeExceedsMarket {
        entity_volume: u64,
        market_volume: u64,
    },

    #[error("labelled counts {labelled} exceed entity_volume {entity_volume}")]
    LabelledExceedsVolume { labelled: u64, entity_volume: u64 },
}

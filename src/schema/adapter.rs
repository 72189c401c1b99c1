//! Parsing and batch validation for input records
//!
//! Accepts either a JSON array or NDJSON (one record per line) of classified
//! messages or pre-aggregated daily records.

use serde::de::DeserializeOwned;

use crate::error::ComputeError;
use crate::schema::message::{validate_aggregate, ClassifiedMessage, ValidationError};
use crate::types::DailyAggregate;

/// Adapter for reading input records
pub struct InputAdapter;

impl InputAdapter {
    /// Parse a JSON string containing an array of messages
    pub fn parse_messages_array(json: &str) -> Result<Vec<ClassifiedMessage>, ComputeError> {
        let messages: Vec<ClassifiedMessage> = serde_json::from_str(json)?;
        Ok(messages)
    }

    /// Parse NDJSON (newline-delimited JSON) containing messages
    pub fn parse_messages_ndjson(ndjson: &str) -> Result<Vec<ClassifiedMessage>, ComputeError> {
        parse_ndjson(ndjson)
    }

    /// Parse a JSON string containing an array of daily aggregates
    pub fn parse_aggregates_array(json: &str) -> Result<Vec<DailyAggregate>, ComputeError> {
        let aggregates: Vec<DailyAggregate> = serde_json::from_str(json)?;
        Ok(aggregates)
    }

    /// Parse NDJSON containing daily aggregates
    pub fn parse_aggregates_ndjson(ndjson: &str) -> Result<Vec<DailyAggregate>, ComputeError> {
        parse_ndjson(ndjson)
    }

    /// Validate a batch of messages, returning only the failures
    pub fn validate_messages(messages: &[ClassifiedMessage]) -> Vec<ValidationResult> {
        messages
            .iter()
            .enumerate()
            .filter_map(|(idx, message)| {
                message.validate().err().map(|error| ValidationResult {
                    index: idx,
                    record_id: message.message_id.clone(),
                    error,
                })
            })
            .collect()
    }

    /// Validate a batch of aggregates, returning only the failures
    pub fn validate_aggregates(aggregates: &[DailyAggregate]) -> Vec<ValidationResult> {
        aggregates
            .iter()
            .enumerate()
            .filter_map(|(idx, aggregate)| {
                validate_aggregate(aggregate)
                    .err()
                    .map(|error| ValidationResult {
                        index: idx,
                        record_id: Some(format!("{}/{}", aggregate.key(), aggregate.date)),
                        error,
                    })
            })
            .collect()
    }
}

/// A record that failed validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub index: usize,
    pub record_id: Option<String>,
    pub error: ValidationError,
}

fn parse_ndjson<T: DeserializeOwned>(ndjson: &str) -> Result<Vec<T>, ComputeError> {
    let mut records = Vec::new();
    for (line_num, line) in ndjson.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(record) => records.push(record),
            Err(e) => {
                return Err(ComputeError::ParseError(format!(
                    "Failed to parse line {}: {}",
                    line_num + 1,
                    e
                )));
            }
        }
    }
    Ok(records)
}

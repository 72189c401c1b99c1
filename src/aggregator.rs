//! Signal aggregation
//!
//! Groups classified messages into one `DailyAggregate` per (entity, locale,
//! calendar day). Calendar days are taken in the configured UTC offset.
//! A day without messages produces no aggregate at all: absence is how gaps
//! are represented downstream.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use tracing::debug;

use crate::config::parse_utc_offset;
use crate::error::ComputeError;
use crate::schema::ClassifiedMessage;
use crate::types::{DailyAggregate, Sentiment};

/// Aggregator for turning classified messages into daily counts
#[derive(Debug, Clone)]
pub struct SignalAggregator {
    offset: FixedOffset,
    tracked_entities: Option<BTreeSet<String>>,
}

impl SignalAggregator {
    /// Create an aggregator that buckets days in the given offset
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            offset,
            tracked_entities: None,
        }
    }

    /// Create an aggregator from a timezone string ("UTC", "+05:30", ...)
    pub fn from_timezone(timezone: &str) -> Result<Self, ComputeError> {
        Ok(Self::new(parse_utc_offset(timezone)?))
    }

    /// Emit zero-volume aggregates for these entities on every (locale, day)
    /// that has conversation but no mention of them
    pub fn with_tracked_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracked_entities = Some(entities.into_iter().map(Into::into).collect());
        self
    }

    /// Aggregate messages into daily counts, sorted by entity, locale and date
    pub fn aggregate(
        &self,
        messages: &[ClassifiedMessage],
    ) -> Result<Vec<DailyAggregate>, ComputeError> {
        let mut by_entity_day: BTreeMap<(String, String, NaiveDate), DayCounts> = BTreeMap::new();
        let mut market: HashMap<(String, NaiveDate), u64> = HashMap::new();

        for message in messages {
            message
                .validate()
                .map_err(|e| ComputeError::ParseError(format!("Invalid message: {e}")))?;

            let date = self.local_date(message);
            *market.entry((message.locale.clone(), date)).or_insert(0) += 1;

            by_entity_day
                .entry((message.entity_id.clone(), message.locale.clone(), date))
                .or_default()
                .add(message.sentiment);
        }

        if let Some(tracked) = &self.tracked_entities {
            for (locale, date) in market.keys() {
                for entity in tracked {
                    by_entity_day
                        .entry((entity.clone(), locale.clone(), *date))
                        .or_default();
                }
            }
        }

        let aggregates: Vec<DailyAggregate> = by_entity_day
            .into_iter()
            .map(|((entity_id, locale, date), counts)| {
                let market_volume = market.get(&(locale.clone(), date)).copied().unwrap_or(0);
                counts.into_aggregate(entity_id, locale, date, market_volume)
            })
            .collect();

        debug!(
            messages = messages.len(),
            aggregates = aggregates.len(),
            locale_days = market.len(),
            "aggregated classified messages"
        );

        Ok(aggregates)
    }

    fn local_date(&self, message: &ClassifiedMessage) -> NaiveDate {
        message.timestamp.with_timezone(&self.offset).date_naive()
    }
}

impl Default for SignalAggregator {
    fn default() -> Self {
        Self {
            offset: Utc.fix(),
            tracked_entities: None,
        }
    }
}

/// Sentiment counts for one entity on one day
#[derive(Debug, Default)]
struct DayCounts {
    positive: u64,
    negative: u64,
    neutral: u64,
}

impl DayCounts {
    fn add(&mut self, sentiment: Sentiment) {
        match sentiment {
            Sentiment::Positive => self.positive += 1,
            Sentiment::Negative => self.negative += 1,
            Sentiment::Neutral => self.neutral += 1,
        }
    }

    fn into_aggregate(
        self,
        entity_id: String,
        locale: String,
        date: NaiveDate,
        market_volume: u64,
    ) -> DailyAggregate {
        DailyAggregate {
            entity_id,
            locale,
            date,
            positive_count: self.positive,
            negative_count: self.negative,
            neutral_count: self.neutral,
            entity_volume: self.positive + self.negative + self.neutral,
            market_volume,
        }
    }
}

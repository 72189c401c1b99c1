//! Async narrative service
//!
//! Ties the upstream cache, the index store and the pipeline together.
//! A refresh of one series fetches its locale's messages, aggregates them,
//! ingests the aggregates and recomputes the series if anything changed.
//! Refreshes of the same series are coalesced; different series refresh in
//! parallel and fail independently.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::aggregator::SignalAggregator;
use crate::config::NarrativeConfig;
use crate::encoder::ResponseEncoder;
use crate::error::{ComputeError, SeriesFailure};
use crate::pipeline::{compute_series, BatchReport};
use crate::singleflight::SingleFlight;
use crate::store::IndexStore;
use crate::types::{AuxiliaryIndicators, NarrativeResponse, SeriesKey, SeriesOutput};
use crate::upstream::{CachedSource, MessageSource};

pub type RefreshResult = Result<SeriesOutput, SeriesFailure>;

/// Shared service computing series on demand
pub struct NarrativeService<S> {
    config: NarrativeConfig,
    upstream: CachedSource<S>,
    aggregator: SignalAggregator,
    store: Mutex<IndexStore>,
    flight: SingleFlight<SeriesKey, RefreshResult>,
    encoder: ResponseEncoder,
}

impl<S: MessageSource + 'static> NarrativeService<S> {
    pub fn new(source: S, config: NarrativeConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        let aggregator = SignalAggregator::new(config.aggregation.offset()?);
        Ok(Self {
            upstream: CachedSource::new(source, &config.upstream),
            aggregator,
            store: Mutex::new(IndexStore::new()),
            flight: SingleFlight::new(),
            encoder: ResponseEncoder::new(),
            config,
        })
    }

    /// Emit zero-volume days for these entities when their locale has conversation
    pub fn with_tracked_entities<I, T>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.aggregator = self.aggregator.with_tracked_entities(entities);
        self
    }

    /// Start from a previously saved store
    pub fn with_store(self, store: IndexStore) -> Self {
        Self {
            store: Mutex::new(store),
            ..self
        }
    }

    pub fn config(&self) -> &NarrativeConfig {
        &self.config
    }

    pub fn upstream(&self) -> &CachedSource<S> {
        &self.upstream
    }

    pub async fn set_indicators(&self, key: &SeriesKey, indicators: AuxiliaryIndicators) {
        self.store.lock().await.set_indicators(key, indicators);
    }

    /// Serialize the current store
    pub async fn save_store(&self) -> Result<String, ComputeError> {
        self.store
            .lock()
            .await
            .to_json()
            .map_err(|e| ComputeError::EncodingError(e.to_string()))
    }

    /// Refresh one series; concurrent refreshes of the same series share the work
    pub async fn refresh(&self, key: &SeriesKey) -> RefreshResult {
        self.flight
            .run(key.clone(), || async {
                self.refresh_uncoalesced(key)
                    .await
                    .map_err(|err| SeriesFailure::new(key, &err))
            })
            .await
    }

    /// Refresh one series and encode the response
    pub async fn respond(&self, key: &SeriesKey) -> Result<NarrativeResponse, SeriesFailure> {
        let output = self.refresh(key).await?;
        Ok(self.encoder.encode(&output, &self.config))
    }

    async fn refresh_uncoalesced(&self, key: &SeriesKey) -> Result<SeriesOutput, ComputeError> {
        let messages = self.upstream.get(&key.locale).await?;
        let aggregates = self.aggregator.aggregate(&messages)?;

        let (aggregates, indicators, revision) = {
            let mut store = self.store.lock().await;
            let touched = store.ingest(aggregates);
            if !touched.is_empty() {
                debug!(locale = %key.locale, series = touched.len(), "aggregates ingested");
            }

            let state = store.get(key).filter(|s| s.has_data()).ok_or_else(|| {
                ComputeError::InvalidInput(format!("no messages for series {key}"))
            })?;
            if !state.is_stale() {
                debug!(entity_id = %key.entity_id, locale = %key.locale, "serving cached series");
                return state.cached_output();
            }
            (state.aggregates(), *state.indicators(), state.revision())
        };

        let output = compute_series(key, &aggregates, &indicators, &self.config)?;

        if !self.store.lock().await.commit_if_current(&output, revision) {
            debug!(
                entity_id = %key.entity_id,
                locale = %key.locale,
                "newer aggregates arrived during refresh, result not cached"
            );
        }
        info!(
            entity_id = %key.entity_id,
            locale = %key.locale,
            days = output.points.len(),
            "series refreshed"
        );
        Ok(output)
    }

    /// Refresh several series in parallel.
    ///
    /// Every series ends up either in `results` or in `failures`.
    pub async fn refresh_batch(self: &Arc<Self>, keys: Vec<SeriesKey>) -> BatchReport {
        let mut pending: BTreeSet<SeriesKey> = keys.iter().cloned().collect();
        let mut join_set = JoinSet::new();

        for key in pending.iter().cloned() {
            let service = self.clone();
            join_set.spawn(async move {
                let outcome = service.refresh(&key).await;
                (key, outcome)
            });
        }

        let mut report = BatchReport::default();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((key, outcome)) => {
                    pending.remove(&key);
                    match outcome {
                        Ok(output) => report.results.push(output),
                        Err(failure) => report.failures.push(failure),
                    }
                }
                Err(err) => warn!(error = %err, "refresh task failed"),
            }
        }

        for key in pending {
            let err = ComputeError::UpstreamError("refresh task aborted".to_string());
            report.failures.push(SeriesFailure::new(&key, &err));
        }

        report.results.sort_by(|a, b| a.key.cmp(&b.key));
        report.failures.sort_by_key(SeriesFailure::key);
        for failure in &report.failures {
            warn!(
                entity_id = %failure.entity_id,
                locale = %failure.locale,
                kind = %failure.kind,
                "series failed"
            );
        }
        report
    }
}

//! Upstream message source and its cache
//!
//! The listening provider is slow and rate limited, so fetched messages are
//! cached per locale:
//!
//! - younger than the TTL: served from cache
//! - within the stale window after the TTL: served from cache while one
//!   background refresh runs
//! - older, or absent: fetched, with concurrent fetches of a locale coalesced
//!
//! Every fetch is bounded by a timeout. Failed fetches are not cached.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::config::UpstreamConfig;
use crate::error::ComputeError;
use crate::schema::ClassifiedMessage;
use crate::singleflight::SingleFlight;

/// Source of classified messages for a locale
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch(&self, locale: &str) -> Result<Vec<ClassifiedMessage>, ComputeError>;
}

pub type Messages = Arc<Vec<ClassifiedMessage>>;

#[derive(Debug, Clone)]
enum FetchFailure {
    Timeout(u64),
    Upstream(String),
}

impl From<FetchFailure> for ComputeError {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::Timeout(secs) => ComputeError::UpstreamTimeout(secs),
            FetchFailure::Upstream(message) => ComputeError::UpstreamError(message),
        }
    }
}

struct CacheEntry {
    messages: Messages,
    fetched_at: Instant,
    refreshing: bool,
}

struct Shared<S> {
    source: S,
    entries: Mutex<HashMap<String, CacheEntry>>,
    flight: SingleFlight<String, Result<Messages, FetchFailure>>,
    ttl: Duration,
    stale: Duration,
    fetch_timeout: Duration,
}

impl<S: MessageSource> Shared<S> {
    async fn refresh(&self, locale: &str) -> Result<Messages, ComputeError> {
        let outcome = self
            .flight
            .run(locale.to_string(), || self.fetch_and_store(locale))
            .await;

        if outcome.is_err() {
            if let Some(entry) = self.entries.lock().await.get_mut(locale) {
                entry.refreshing = false;
            }
        }
        outcome.map_err(ComputeError::from)
    }

    async fn fetch_and_store(&self, locale: &str) -> Result<Messages, FetchFailure> {
        let fetched = timeout(self.fetch_timeout, self.source.fetch(locale)).await;
        match fetched {
            Ok(Ok(messages)) => {
                let messages = Arc::new(messages);
                debug!(locale, messages = messages.len(), "upstream fetched");
                self.entries.lock().await.insert(
                    locale.to_string(),
                    CacheEntry {
                        messages: messages.clone(),
                        fetched_at: Instant::now(),
                        refreshing: false,
                    },
                );
                Ok(messages)
            }
            Ok(Err(err)) => {
                warn!(locale, error = %err, "upstream fetch failed");
                Err(FetchFailure::Upstream(match err {
                    ComputeError::UpstreamError(message) => message,
                    other => other.to_string(),
                }))
            }
            Err(_) => {
                warn!(locale, timeout_secs = self.fetch_timeout.as_secs(), "upstream fetch timed out");
                Err(FetchFailure::Timeout(self.fetch_timeout.as_secs()))
            }
        }
    }
}

/// Caching, coalescing wrapper around a `MessageSource`
pub struct CachedSource<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for CachedSource<S> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

enum Lookup {
    Fresh(Messages),
    Stale { messages: Messages, spawn: bool },
    Miss,
}

impl<S: MessageSource + 'static> CachedSource<S> {
    pub fn new(source: S, config: &UpstreamConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                entries: Mutex::new(HashMap::new()),
                flight: SingleFlight::new(),
                ttl: Duration::from_secs(config.cache_ttl_secs),
                stale: Duration::from_secs(config.stale_secs),
                fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            }),
        }
    }

    pub fn source(&self) -> &S {
        &self.shared.source
    }

    /// Messages for a locale, from cache when possible
    pub async fn get(&self, locale: &str) -> Result<Messages, ComputeError> {
        match self.lookup(locale).await {
            Lookup::Fresh(messages) => {
                debug!(locale, "upstream cache hit");
                Ok(messages)
            }
            Lookup::Stale { messages, spawn } => {
                debug!(locale, "upstream cache stale, revalidating");
                if spawn {
                    let shared = self.shared.clone();
                    let locale = locale.to_string();
                    tokio::spawn(async move {
                        // failures are logged by the fetch and leave the stale entry in place
                        let _ = shared.refresh(&locale).await;
                    });
                }
                Ok(messages)
            }
            Lookup::Miss => self.shared.refresh(locale).await,
        }
    }

    /// Drop the cached entry of a locale
    pub async fn evict(&self, locale: &str) {
        self.shared.entries.lock().await.remove(locale);
    }

    async fn lookup(&self, locale: &str) -> Lookup {
        let mut entries = self.shared.entries.lock().await;
        let Some(entry) = entries.get_mut(locale) else {
            return Lookup::Miss;
        };

        let age = entry.fetched_at.elapsed();
        if age < self.shared.ttl {
            Lookup::Fresh(entry.messages.clone())
        } else if age < self.shared.ttl + self.shared.stale {
            let spawn = !entry.refreshing;
            entry.refreshing = true;
            Lookup::Stale {
                messages: entry.messages.clone(),
                spawn,
            }
        } else {
            Lookup::Miss
        }
    }
}

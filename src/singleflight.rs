//! Request coalescing
//!
//! Concurrent calls for the same key share one execution of the work and all
//! receive a clone of its result. The entry is dropped once the work is done,
//! or once its last caller goes away, so a later call starts fresh even when
//! callers are cancelled.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

type Inflight<K, V> = Mutex<HashMap<K, Arc<OnceCell<V>>>>;

/// Coalesces concurrent work per key
pub struct SingleFlight<K, V> {
    inflight: Inflight<K, V>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

/// Held by every caller; removes the entry on completion or cancellation
struct Release<'a, K: Eq + Hash, V> {
    inflight: &'a Inflight<K, V>,
    key: K,
    cell: Arc<OnceCell<V>>,
}

impl<K: Eq + Hash, V> Drop for Release<'_, K, V> {
    fn drop(&mut self) {
        let mut inflight = self.inflight.lock();
        let Some(current) = inflight.get(&self.key) else {
            return;
        };
        // map entry plus this caller
        let last_caller = Arc::strong_count(&self.cell) <= 2;
        if Arc::ptr_eq(current, &self.cell) && (self.cell.initialized() || last_caller) {
            inflight.remove(&self.key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` for `key`, or wait for the execution already in flight
    pub async fn run<F, Fut>(&self, key: K, work: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self
            .inflight
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let release = Release {
            inflight: &self.inflight,
            key,
            cell,
        };
        let value = release.cell.get_or_init(work).await.clone();
        value
    }

    /// Number of keys with work in flight
    pub fn in_flight(&self) -> usize {
        self.inflight.lock().len()
    }
}

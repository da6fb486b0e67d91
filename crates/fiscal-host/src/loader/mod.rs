//! Request-scoped batching and memoization of keyed lookups.
//!
//! Every key requested through a [`BatchLoader`] during one batching window is collected,
//! deduplicated and fetched with a single [`BatchFn::load`] call. The window stays open until
//! the first caller reaches its next cooperative yield point, so lookups issued concurrently
//! (`join!`, sibling tasks, resolvers of the same request) share one fetch. Results are handed
//! back in the order and multiplicity each caller asked for.
//!
//! A key whose fetch is still running is never fetched again: later callers attach to the
//! pending result. Windows, and the chunks of a window, are fetched one at a time.

mod group;

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex as DispatchLock};
use tracing::{debug, warn};

use crate::storage::StorageError;

pub use group::group_by_keys;

/// Fetches the values for a deduplicated set of keys.
#[async_trait]
pub trait BatchFn: Send + Sync {
    type Key: Clone + Eq + Hash + Send + Sync;
    type Value: Clone + Send + Sync;

    /// Must return exactly one value per key, in key order.
    async fn load(&self, keys: &[Self::Key]) -> Result<Vec<Self::Value>, LoaderError>;
}

/// Failure shared by every caller of a batching window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoaderError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("batch function returned {actual} values for {expected} keys")]
    Misaligned { expected: usize, actual: usize },
    #[error("batch was cancelled before it resolved")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Upper bound on distinct keys per fetch; a larger window is fetched in chunks.
    pub max_batch_size: Option<usize>,
    /// Memoize resolved values for the lifetime of the loader.
    pub cache: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            cache: true,
        }
    }
}

type Waiter<V> = oneshot::Sender<Result<V, LoaderError>>;

struct LoaderState<K, V> {
    cache: HashMap<K, V>,
    queued: Vec<K>,
    waiters: HashMap<K, Vec<Waiter<V>>>,
    in_flight: HashMap<K, Vec<Waiter<V>>>,
}

impl<K, V> Default for LoaderState<K, V> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            queued: Vec::new(),
            waiters: HashMap::new(),
            in_flight: HashMap::new(),
        }
    }
}

enum Slot<V> {
    Ready(V),
    Pending(oneshot::Receiver<Result<V, LoaderError>>),
}

/// Coalesces lookups into batched fetches. Create one per request; instances share nothing.
pub struct BatchLoader<F: BatchFn> {
    fetcher: F,
    options: LoaderOptions,
    state: Mutex<LoaderState<F::Key, F::Value>>,
    dispatching: DispatchLock<()>,
}

impl<F: BatchFn> BatchLoader<F> {
    pub fn new(fetcher: F) -> Self {
        Self::with_options(fetcher, LoaderOptions::default())
    }

    pub fn with_options(fetcher: F, options: LoaderOptions) -> Self {
        Self {
            fetcher,
            options,
            state: Mutex::new(LoaderState::default()),
            dispatching: DispatchLock::new(()),
        }
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    fn state(&self) -> MutexGuard<'_, LoaderState<F::Key, F::Value>> {
        self.state.lock().expect("loader state poisoned")
    }

    pub async fn load(&self, key: F::Key) -> Result<F::Value, LoaderError> {
        let mut values = self.load_many(std::slice::from_ref(&key)).await?;
        values.pop().ok_or(LoaderError::Misaligned {
            expected: 1,
            actual: 0,
        })
    }

    /// Resolve every key, returning values aligned with `keys` (duplicates included).
    pub async fn load_many(&self, keys: &[F::Key]) -> Result<Vec<F::Value>, LoaderError> {
        let slots = self.enqueue(keys);

        if slots.iter().any(|slot| matches!(slot, Slot::Pending(_))) {
            tokio::task::yield_now().await;
            self.dispatch().await;
        }

        let mut values = Vec::with_capacity(slots.len());
        for slot in slots {
            let value = match slot {
                Slot::Ready(value) => value,
                Slot::Pending(receiver) => receiver.await.map_err(|_| LoaderError::Cancelled)??,
            };
            values.push(value);
        }
        Ok(values)
    }

    fn enqueue(&self, keys: &[F::Key]) -> Vec<Slot<F::Value>> {
        let mut guard = self.state();
        let state = &mut *guard;
        let mut slots = Vec::with_capacity(keys.len());

        for key in keys {
            if self.options.cache {
                if let Some(value) = state.cache.get(key) {
                    slots.push(Slot::Ready(value.clone()));
                    continue;
                }
            }

            let (sender, receiver) = oneshot::channel();
            if let Some(pending) = state.in_flight.get_mut(key) {
                pending.push(sender);
                slots.push(Slot::Pending(receiver));
                continue;
            }
            match state.waiters.entry(key.clone()) {
                Entry::Occupied(mut entry) => entry.get_mut().push(sender),
                Entry::Vacant(entry) => {
                    entry.insert(vec![sender]);
                    state.queued.push(key.clone());
                }
            }
            slots.push(Slot::Pending(receiver));
        }

        slots
    }

    /// Fetch everything queued in the current window. A no-op once another caller took it.
    ///
    /// Only one caller fetches at a time; the others wait here and then find the queue empty.
    pub async fn dispatch(&self) {
        let _dispatching = self.dispatching.lock().await;
        loop {
            let keys = self.take_batch();
            if keys.is_empty() {
                return;
            }
            self.resolve_batch(keys).await;
        }
    }

    /// Move the next chunk of queued keys, with their waiters, into the in-flight set.
    fn take_batch(&self) -> Vec<F::Key> {
        let mut guard = self.state();
        let state = &mut *guard;
        let take = match self.options.max_batch_size {
            Some(limit) => limit.max(1).min(state.queued.len()),
            None => state.queued.len(),
        };

        let keys: Vec<F::Key> = state.queued.drain(..take).collect();
        for key in &keys {
            let waiters = state.waiters.remove(key).unwrap_or_default();
            state.in_flight.insert(key.clone(), waiters);
        }
        keys
    }

    async fn resolve_batch(&self, keys: Vec<F::Key>) {
        debug!(keys = keys.len(), "dispatching batch");
        let mut in_flight = InFlight {
            state: &self.state,
            keys,
        };

        let outcome = self
            .fetcher
            .load(in_flight.keys.as_slice())
            .await
            .and_then(|values| check_alignment(in_flight.keys.len(), values));

        let keys = std::mem::take(&mut in_flight.keys);
        let waiters: Vec<Vec<Waiter<F::Value>>> = {
            let mut state = self.state();
            if let Ok(values) = &outcome {
                if self.options.cache {
                    for (key, value) in keys.iter().zip(values.iter()) {
                        state.cache.insert(key.clone(), value.clone());
                    }
                }
            }
            keys.iter()
                .map(|key| state.in_flight.remove(key).unwrap_or_default())
                .collect()
        };

        match outcome {
            Ok(values) => {
                for (waiters, value) in waiters.into_iter().zip(values) {
                    for waiter in waiters {
                        let _ = waiter.send(Ok(value.clone()));
                    }
                }
            }
            Err(err) => {
                warn!(keys = keys.len(), error = %err, "batch fetch failed");
                for waiter in waiters.into_iter().flatten() {
                    let _ = waiter.send(Err(err.clone()));
                }
            }
        }
    }

    /// Seed the cache; existing entries are kept.
    pub fn prime(&self, key: F::Key, value: F::Value) {
        self.state().cache.entry(key).or_insert(value);
    }

    pub fn clear(&self, key: &F::Key) {
        self.state().cache.remove(key);
    }

    pub fn clear_all(&self) {
        self.state().cache.clear();
    }
}

/// Keys of a running fetch. Dropped before it resolves, it releases their waiters as cancelled.
struct InFlight<'a, K: Eq + Hash, V> {
    state: &'a Mutex<LoaderState<K, V>>,
    keys: Vec<K>,
}

impl<K: Eq + Hash, V> Drop for InFlight<'_, K, V> {
    fn drop(&mut self) {
        if self.keys.is_empty() {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            for key in &self.keys {
                state.in_flight.remove(key);
            }
        }
    }
}

fn check_alignment<V>(expected: usize, values: Vec<V>) -> Result<Vec<V>, LoaderError> {
    if values.len() == expected {
        Ok(values)
    } else {
        Err(LoaderError::Misaligned {
            expected,
            actual: values.len(),
        })
    }
}

#[cfg(test)]
mod tests;

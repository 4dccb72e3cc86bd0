//! Single-flight deduplication of asynchronous reads.
//!
//! Concurrent callers asking for the same key share one producer run and its
//! outcome. The entry is evicted as soon as the producer settles, so the next
//! call after that starts a fresh run.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::debug;

pub type SharedFetch<V> = Shared<BoxFuture<'static, V>>;

struct Flight<V: Clone> {
    generation: u64,
    future: SharedFetch<V>,
}

struct Inner<K, V: Clone> {
    next_generation: u64,
    flights: HashMap<K, Flight<V>>,
}

pub struct FetchDedup<K, V: Clone> {
    inner: Arc<Mutex<Inner<K, V>>>,
}

impl<K, V: Clone> Clone for FetchDedup<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for FetchDedup<K, V>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FetchDedup<K, V>
where
    K: Eq + Hash + Clone + Send + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                next_generation: 0,
                flights: HashMap::new(),
            })),
        }
    }

    /// Returns the in-flight future for `key`, starting `producer` only when
    /// no flight exists. The producer is not invoked for joining callers.
    pub fn run<F, Fut>(&self, key: K, producer: F) -> SharedFetch<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut inner = self.inner.lock();
        if let Some(flight) = inner.flights.get(&key) {
            debug!(?key, "Joining in-flight fetch");
            return flight.future.clone();
        }

        let generation = inner.next_generation;
        inner.next_generation += 1;

        let registry = Arc::clone(&self.inner);
        let evict_key = key.clone();
        let work = producer();
        let future = async move {
            let outcome = work.await;
            let mut inner = registry.lock();
            // Only evict our own flight; a newer one may own the key by now.
            if inner
                .flights
                .get(&evict_key)
                .is_some_and(|f| f.generation == generation)
            {
                inner.flights.remove(&evict_key);
            }
            outcome
        }
        .boxed()
        .shared();

        inner.flights.insert(
            key,
            Flight {
                generation,
                future: future.clone(),
            },
        );
        future
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inner.lock().flights.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.inner.lock().flights.len()
    }
}

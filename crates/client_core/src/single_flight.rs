//! Keyed deduplication of in-flight futures.

use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::atomic::{AtomicU64, Ordering},
};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;

type SharedFlight<V> = Shared<BoxFuture<'static, V>>;

/// Concurrent callers with the same key await one shared future. The entry
/// is dropped once the future resolves, so a later call starts fresh.
pub struct SingleFlight<K, V: Clone> {
    flights: Mutex<HashMap<K, (u64, SharedFlight<V>)>>,
    next_generation: AtomicU64,
}

impl<K, V> Default for SingleFlight<K, V>
where
    V: Clone,
{
    fn default() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `make()` unless a flight for `key` is already running, in which
    /// case its result is awaited instead.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let (generation, flight) = {
            let mut flights = self.flights.lock().await;
            match flights.get(&key) {
                Some((generation, flight)) => (*generation, flight.clone()),
                None => {
                    let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
                    let flight = make().boxed().shared();
                    flights.insert(key.clone(), (generation, flight.clone()));
                    (generation, flight)
                }
            }
        };

        let value = flight.await;

        let mut flights = self.flights.lock().await;
        if flights
            .get(&key)
            .is_some_and(|(current, _)| *current == generation)
        {
            flights.remove(&key);
        }
        value
    }

    pub async fn in_flight(&self, key: &K) -> bool {
        self.flights.lock().await.contains_key(key)
    }
}

#[cfg(test)]
#[path = "tests/single_flight_tests.rs"]
mod tests;

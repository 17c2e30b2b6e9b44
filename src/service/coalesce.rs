//! Single-flight request coalescing
//!
//! At most one `work` future runs per key at any instant. Callers arriving
//! while it runs attach to the same shared future and receive a clone of its
//! result, success or failure.
//!
//! The work is driven by its own task, so a caller going away never cancels
//! the call for the others. The in-flight marker is removed by a drop guard
//! inside that task, before the shared future resolves.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinError;

use crate::metrics::{COALESCED_JOINS_TOTAL, IN_FLIGHT_CALLS};

type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;
type FlightMap<K, T, E> = Arc<Mutex<HashMap<K, Flight<T, E>>>>;

/// How a caller took part in a flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightRole {
    /// Started the work
    Leader,
    /// Joined work already underway
    Follower,
}

/// Per-key in-flight call registry
pub struct SingleFlight<K, T, E> {
    in_flight: FlightMap<K, T, E>,
}

/// Removes the flight's marker however the work ends, panics included.
struct FlightGuard<K, T, E>
where
    K: Hash + Eq,
{
    in_flight: FlightMap<K, T, E>,
    key: Option<K>,
}

impl<K, T, E> Drop for FlightGuard<K, T, E>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&key);
            IN_FLIGHT_CALLS.dec();
        }
    }
}

impl<K, T, E> SingleFlight<K, T, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Flight<T, E>>> {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` for `key`, or join the run already in progress
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.run_tracked(key, work).await.1
    }

    /// Like `run`, also reporting whether this caller started the work
    pub async fn run_tracked<F, Fut>(&self, key: K, work: F) -> (FlightRole, Result<T, E>)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        // Lookup and install happen under one lock so two callers can never
        // both become leader for the same key.
        let (role, flight) = {
            let mut in_flight = self.lock();
            match in_flight.get(&key) {
                Some(existing) => {
                    COALESCED_JOINS_TOTAL.inc();
                    (FlightRole::Follower, existing.clone())
                }
                None => {
                    let flight = self.launch(key.clone(), work());
                    in_flight.insert(key, flight.clone());
                    (FlightRole::Leader, flight)
                }
            }
        };

        (role, flight.await)
    }

    fn launch<Fut>(&self, key: K, work: Fut) -> Flight<T, E>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        IN_FLIGHT_CALLS.inc();
        let guard = FlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key: Some(key),
        };

        let handle = tokio::spawn(async move {
            let result = work.await;
            drop(guard);
            result
        });

        handle
            .map(|joined| match joined {
                Ok(result) => result,
                Err(error) => Err(E::from(error)),
            })
            .boxed()
            .shared()
    }

    /// Number of keys with work currently running
    pub fn in_flight_count(&self) -> usize {
        self.lock().len()
    }
}

impl<K, T, E> Default for SingleFlight<K, T, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + From<JoinError> + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

//! Request Coalescer
//!
//! Deduplicates concurrent loads of the same key. The first caller for a key
//! spawns the load as its own task and publishes a shared channel; every
//! caller, the first one included, waits on that channel. Because the load
//! lives in a separate task, a caller that gives up (timeout, dropped future)
//! never cancels the work the remaining callers are waiting for.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{CacheError, Result};

type FlightChannel<T> = Shared<oneshot::Receiver<Result<T>>>;

struct Flight<T> {
    id: u64,
    channel: FlightChannel<T>,
}

type FlightTable<T> = Arc<Mutex<HashMap<String, Flight<T>>>>;

/// At most one outstanding load per key.
pub struct Coalescer<T> {
    flights: FlightTable<T>,
    next_id: AtomicU64,
}

impl<T> Default for Coalescer<T> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> Coalescer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `load` for `key` unless a load for the same key is already in
    /// flight, in which case its result is awaited and shared instead.
    ///
    /// `load` is only polled when this call becomes the leader. The flight
    /// entry is removed before the result is published, so a call arriving
    /// after completion always starts a fresh load.
    ///
    /// The leader's load is spawned before this returns, so it runs even if
    /// the returned future is never awaited.
    pub fn run<F>(&self, key: &str, load: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let channel = {
            let mut flights = self.flights.lock();
            match flights.get(key) {
                Some(flight) => {
                    debug!(key = %key, "joining in-flight load");
                    flight.channel.clone()
                }
                None => {
                    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                    let channel = self.spawn_flight(key, id, load);
                    flights.insert(
                        key.to_string(),
                        Flight {
                            id,
                            channel: channel.clone(),
                        },
                    );
                    channel
                }
            }
        };

        async move {
            channel.await.unwrap_or_else(|_| {
                Err(CacheError::Internal(
                    "in-flight load terminated without a result".to_string(),
                ))
            })
        }
    }

    /// Number of keys with a load currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    fn spawn_flight<F>(&self, key: &str, id: u64, load: F) -> FlightChannel<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let token = RemoveOnDrop {
            flights: Arc::clone(&self.flights),
            key: key.to_string(),
            id,
        };

        tokio::spawn(async move {
            let result = load.await;
            // Evict first so that late callers start a new load instead of
            // observing a finished one.
            drop(token);
            sender.send(result).ok();
        });

        receiver.shared()
    }
}

/// Removes a flight from the table when the load finishes, or panics.
struct RemoveOnDrop<T> {
    flights: FlightTable<T>,
    key: String,
    id: u64,
}

impl<T> Drop for RemoveOnDrop<T> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock();
        if flights.get(&self.key).map(|f| f.id) == Some(self.id) {
            flights.remove(&self.key);
        }
    }
}

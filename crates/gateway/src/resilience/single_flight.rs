//! Coalescing of concurrent duplicate calls.
//!
//! The first caller for a key starts the operation and registers it; callers
//! arriving while it is pending await the same shared future instead of
//! starting their own. The operation runs on its own task, so it settles and
//! clears its registration even when every caller has gone away or the
//! operation panics. The next caller after that starts a fresh operation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};
use tokio::sync::oneshot;

use crate::errors::GatewayError;

type SharedCall<V> = Shared<BoxFuture<'static, Result<V, GatewayError>>>;
type Calls<V> = Mutex<HashMap<String, InFlight<V>>>;

/// A pending call plus the generation it was registered under.
struct InFlight<V> {
    generation: u64,
    call: SharedCall<V>,
}

fn lock_calls<V>(calls: &Calls<V>) -> MutexGuard<'_, HashMap<String, InFlight<V>>> {
    calls.lock().unwrap_or_else(|poisoned| {
        warn!("Single-flight mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// Removes a registration when dropped, unless a newer call replaced it.
struct Registration<V> {
    calls: Arc<Calls<V>>,
    key: String,
    generation: u64,
}

impl<V> Drop for Registration<V> {
    fn drop(&mut self) {
        let mut calls = lock_calls(&self.calls);
        if calls
            .get(&self.key)
            .is_some_and(|current| current.generation == self.generation)
        {
            calls.remove(&self.key);
        }
    }
}

/// Per-key registry of in-flight operations.
pub struct SingleFlight<V> {
    calls: Arc<Calls<V>>,
    generations: AtomicU64,
}

impl<V> SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(HashMap::new())),
            generations: AtomicU64::new(0),
        }
    }

    /// Run `start` for `key`, or join the call already running for it.
    ///
    /// `start` is only invoked by the caller that registers the call. Every
    /// joined caller receives a clone of the same outcome, errors included.
    /// Must be called from within a tokio runtime.
    pub async fn run<F, Fut>(&self, key: &str, start: F) -> Result<V, GatewayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, GatewayError>> + Send + 'static,
    {
        let (call, leader) = {
            let mut calls = lock_calls(&self.calls);
            match calls.get(key) {
                Some(existing) => {
                    debug!("Single-flight: joining in-flight call for '{}'", key);
                    (existing.call.clone(), None)
                }
                None => {
                    let generation = self.generations.fetch_add(1, Ordering::Relaxed);
                    let (sender, receiver) = oneshot::channel();
                    let label = key.to_string();
                    let call = receiver
                        .map(move |received| {
                            received.unwrap_or_else(|_| {
                                Err(GatewayError::Interrupted(format!(
                                    "in-flight call for '{}' ended without a result",
                                    label
                                )))
                            })
                        })
                        .boxed()
                        .shared();
                    calls.insert(
                        key.to_string(),
                        InFlight {
                            generation,
                            call: call.clone(),
                        },
                    );
                    (call, Some((generation, sender)))
                }
            }
        };

        if let Some((generation, sender)) = leader {
            // Built before `start` so a panic there still clears the entry.
            let registration = Registration {
                calls: Arc::clone(&self.calls),
                key: key.to_string(),
                generation,
            };
            let pending = start();
            tokio::spawn(async move {
                let outcome = pending.await;
                drop(registration);
                // Nobody left waiting is fine; the entry is already cleared.
                let _ = sender.send(outcome);
            });
        }

        call.await
    }

    /// Number of keys with a pending call.
    pub fn in_flight(&self) -> usize {
        lock_calls(&self.calls).len()
    }
}

impl<V> Default for SingleFlight<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

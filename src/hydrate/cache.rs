//! Coalescing hydration cache
//!
//! A keyed store where every key is computed at most once at a time. The first
//! caller for an absent key becomes the leader and runs the computation in its
//! own task; concurrent callers for the same key park on a `watch` channel and
//! receive the leader's outcome, success or failure.
//!
//! Failures are never stored: the key goes back to absent and the next caller
//! starts a fresh attempt. If the leader is dropped before finishing, the key
//! also goes back to absent and one of the parked callers takes over with its
//! own computation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use super::error::HydrateError;
use super::key::CacheKey;

type Outcome<V> = Option<Result<V, HydrateError>>;

tokio::task_local! {
    /// Keys the current task is computing, tagged with the owning cache id.
    static RESOLVING: Vec<(u64, CacheKey)>;
}

static NEXT_CACHE_ID: AtomicU64 = AtomicU64::new(0);

enum Slot<V> {
    Pending {
        attempt: u64,
        rx: watch::Receiver<Outcome<V>>,
    },
    Resolved(V),
}

enum Role<'a, V> {
    Lead(PendingGuard<'a, V>),
    Wait(watch::Receiver<Outcome<V>>),
}

/// In-memory single-flight cache.
///
/// Values are cloned out to every caller, so `V` is usually an `Arc`. The cache
/// is unbounded and has no TTL; entries stay until [`invalidate`](Self::invalidate)
/// or [`clear`](Self::clear) removes them.
pub struct HydrationCache<V> {
    id: u64,
    name: &'static str,
    attempts: AtomicU64,
    slots: Mutex<HashMap<CacheKey, Slot<V>>>,
}

impl<V> HydrationCache<V> {
    /// Create an empty cache. `name` only shows up in logs.
    pub fn new(name: &'static str) -> Self {
        Self {
            id: NEXT_CACHE_ID.fetch_add(1, Ordering::Relaxed),
            name,
            attempts: AtomicU64::new(0),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Number of entries, pending ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Evict a resolved entry. Returns `false` if the key was absent or still
    /// being computed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let mut slots = self.lock();
        if matches!(slots.get(key), Some(Slot::Resolved(_))) {
            slots.remove(key);
            tracing::debug!("{}: invalidated {}", self.name, key);
            true
        } else {
            false
        }
    }

    /// Evict every resolved entry. In-flight computations are left to finish.
    pub fn clear(&self) {
        self.lock()
            .retain(|_, slot| matches!(slot, Slot::Pending { .. }));
        tracing::debug!("{}: cleared resolved entries", self.name);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot<V>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_resolving(&self, key: &CacheKey) -> bool {
        RESOLVING
            .try_with(|stack| stack.iter().any(|(id, k)| *id == self.id && k == key))
            .unwrap_or(false)
    }
}

impl<V: Clone> HydrationCache<V> {
    /// Peek at a resolved value without computing anything.
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        match self.lock().get(key) {
            Some(Slot::Resolved(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Return the value for `key`, running `compute` if no other caller already
    /// produced it or is producing it.
    ///
    /// `compute` is invoked at most once, and only if this caller ends up as the
    /// leader for the key. Concurrent callers all observe the leader's outcome.
    /// Calling this for a key the current task is already computing returns
    /// [`HydrateError::Reentrant`].
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: &CacheKey,
        compute: F,
    ) -> Result<V, HydrateError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, HydrateError>>,
    {
        if self.is_resolving(key) {
            tracing::error!("{}: re-entrant hydration of {}", self.name, key);
            return Err(HydrateError::Reentrant(key.clone()));
        }

        let guard = loop {
            let role = {
                let mut slots = self.lock();
                match slots.get(key) {
                    Some(Slot::Resolved(value)) => {
                        tracing::trace!("{}: hit {}", self.name, key);
                        return Ok(value.clone());
                    }
                    Some(Slot::Pending { rx, .. }) => Role::Wait(rx.clone()),
                    None => {
                        let attempt = self.attempts.fetch_add(1, Ordering::Relaxed);
                        let (tx, rx) = watch::channel(None);
                        slots.insert(key.clone(), Slot::Pending { attempt, rx });
                        Role::Lead(PendingGuard {
                            cache: self,
                            key: key.clone(),
                            attempt,
                            tx,
                            armed: true,
                        })
                    }
                }
            };

            match role {
                Role::Lead(guard) => break guard,
                Role::Wait(rx) => {
                    tracing::debug!("{}: waiting on in-flight {}", self.name, key);
                    if let Some(outcome) = wait_for_outcome(rx).await {
                        return outcome;
                    }
                    tracing::debug!("{}: leader for {} went away, retrying", self.name, key);
                }
            }
        };

        tracing::debug!("{}: hydrating {}", self.name, key);
        let mut stack = RESOLVING.try_with(Clone::clone).unwrap_or_default();
        stack.push((self.id, key.clone()));
        let outcome = RESOLVING.scope(stack, compute()).await;

        if let Err(err) = &outcome {
            tracing::warn!("{}: hydrating {} failed: {}", self.name, key, err);
        }
        guard.publish(outcome.clone());
        outcome
    }
}

impl<V> fmt::Debug for HydrationCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HydrationCache")
            .field("name", &self.name)
            .field("entries", &self.len())
            .finish()
    }
}

async fn wait_for_outcome<V: Clone>(
    mut rx: watch::Receiver<Outcome<V>>,
) -> Option<Result<V, HydrateError>> {
    // A closed channel without an outcome means the leader was dropped.
    let outcome = match rx.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone(),
        Err(_) => None,
    };
    outcome
}

/// Held by the leader while it computes. Dropping it unpublished reverts the
/// key to absent and closes the channel.
struct PendingGuard<'a, V> {
    cache: &'a HydrationCache<V>,
    key: CacheKey,
    attempt: u64,
    tx: watch::Sender<Outcome<V>>,
    armed: bool,
}

impl<V: Clone> PendingGuard<'_, V> {
    fn publish(mut self, outcome: Result<V, HydrateError>) {
        {
            let mut slots = self.cache.lock();
            match &outcome {
                Ok(value) => {
                    slots.insert(self.key.clone(), Slot::Resolved(value.clone()));
                }
                Err(_) => self.release(&mut slots),
            }
        }
        self.tx.send_replace(Some(outcome));
        self.armed = false;
    }
}

impl<V> PendingGuard<'_, V> {
    fn release(&self, slots: &mut HashMap<CacheKey, Slot<V>>) {
        if let Some(Slot::Pending { attempt, .. }) = slots.get(&self.key) {
            if *attempt == self.attempt {
                slots.remove(&self.key);
            }
        }
    }
}

impl<V> Drop for PendingGuard<'_, V> {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("{}: abandoned hydration of {}", self.cache.name, self.key);
            let mut slots = self.cache.lock();
            self.release(&mut slots);
        }
    }
}

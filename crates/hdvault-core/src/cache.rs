//! Keyed single-flight cache.
//!
//! `CachedValue` keeps at most one fetch in flight per key. Concurrent callers for a key
//! that is loading wait for the same result. Successful results are kept until the
//! refresh interval passes; errors are handed to every waiter and never stored.

use crate::session::SessionEvent;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Tokio's clock; follows paused time in tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// How long a fetched value stays fresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshControl {
    Periodic { interval: Duration },
    /// Never expires; only invalidation drops the value.
    Perpetual,
}

impl RefreshControl {
    pub fn periodic(interval: Duration) -> Self {
        RefreshControl::Periodic { interval }
    }

    fn expires_at(&self, now: Instant) -> Option<Instant> {
        match self {
            RefreshControl::Periodic { interval } => Some(now + *interval),
            RefreshControl::Perpetual => None,
        }
    }
}

#[derive(Clone)]
pub struct CacheConfiguration {
    pub refresh_control: RefreshControl,
    pub clock: Arc<dyn Clock>,
}

impl CacheConfiguration {
    pub fn periodic(interval: Duration) -> Self {
        Self {
            refresh_control: RefreshControl::periodic(interval),
            clock: Arc::new(TokioClock),
        }
    }

    pub fn perpetual() -> Self {
        Self {
            refresh_control: RefreshControl::Perpetual,
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

/// Observable state of one key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryState {
    Absent,
    Loading,
    Fresh,
    Stale,
}

type Fetch<K, V, E> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, E>> + Send + Sync>;
type Outcome<V, E> = Option<Result<V, E>>;

enum Slot<V, E> {
    Loading {
        generation: u64,
        outcome: watch::Receiver<Outcome<V, E>>,
    },
    Ready {
        value: V,
        expires_at: Option<Instant>,
    },
}

struct Entries<K, V, E> {
    slots: HashMap<K, Slot<V, E>>,
    next_generation: u64,
}

struct Inner<K, V, E> {
    entries: Mutex<Entries<K, V, E>>,
    fetch: Fetch<K, V, E>,
    config: CacheConfiguration,
}

impl<K: Eq + Hash, V, E> Inner<K, V, E> {
    fn is_expired(&self, expires_at: Option<Instant>) -> bool {
        expires_at.is_some_and(|at| self.config.clock.now() >= at)
    }
}

enum Next<V, E> {
    Wait(watch::Receiver<Outcome<V, E>>),
    Lead(watch::Sender<Outcome<V, E>>, u64),
}

/// Keyed cache with single-flight fetching.
pub struct CachedValue<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for CachedValue<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V, E> CachedValue<K, V, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(config: CacheConfiguration, fetch: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Entries {
                    slots: HashMap::new(),
                    next_generation: 0,
                }),
                fetch: Arc::new(move |key| fetch(key).boxed()),
                config,
            }),
        }
    }

    /// Cached value for `key`, fetching it if absent or expired.
    pub async fn get(&self, key: K) -> Result<V, E> {
        loop {
            let next = {
                let mut entries = self.inner.entries.lock();
                match entries.slots.get(&key) {
                    Some(Slot::Ready { value, expires_at }) if !self.inner.is_expired(*expires_at) => {
                        return Ok(value.clone());
                    }
                    Some(Slot::Loading { outcome, .. }) => Next::Wait(outcome.clone()),
                    _ => {
                        let generation = entries.next_generation;
                        entries.next_generation += 1;
                        let (sender, outcome) = watch::channel(None);
                        entries
                            .slots
                            .insert(key.clone(), Slot::Loading { generation, outcome });
                        Next::Lead(sender, generation)
                    }
                }
            };

            match next {
                Next::Wait(mut outcome) => {
                    let delivered = outcome
                        .wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|result| result.clone());
                    match delivered {
                        Some(result) => return result,
                        // Leader went away without an outcome; try again.
                        None => continue,
                    }
                }
                Next::Lead(sender, generation) => {
                    let guard = LoadingGuard {
                        inner: &self.inner,
                        key: &key,
                        generation,
                        armed: true,
                    };
                    let result = (self.inner.fetch)(key.clone()).await;
                    guard.settle(&result);
                    let _ = sender.send(Some(result.clone()));
                    return result;
                }
            }
        }
    }

    /// Drop the entry for `key`. A fetch in flight still answers its waiters but is not stored.
    pub fn invalidate(&self, key: &K) {
        self.inner.entries.lock().slots.remove(key);
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.inner.entries.lock();
        let count = entries.slots.len();
        entries.slots.clear();
        debug!(entries = count, "cache flushed");
    }

    pub fn state(&self, key: &K) -> EntryState {
        match self.inner.entries.lock().slots.get(key) {
            None => EntryState::Absent,
            Some(Slot::Loading { .. }) => EntryState::Loading,
            Some(Slot::Ready { expires_at, .. }) if self.inner.is_expired(*expires_at) => EntryState::Stale,
            Some(Slot::Ready { .. }) => EntryState::Fresh,
        }
    }

    /// Flush the cache whenever the session broadcasts a logout.
    pub fn flush_on(&self, mut events: broadcast::Receiver<SessionEvent>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Logout) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        cache.invalidate_all();
                    }
                    Ok(SessionEvent::Login) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Clears a `Loading` slot if its leader stops before settling it.
struct LoadingGuard<'a, K: Eq + Hash, V, E> {
    inner: &'a Inner<K, V, E>,
    key: &'a K,
    generation: u64,
    armed: bool,
}

impl<'a, K: Clone + Eq + Hash, V: Clone, E> LoadingGuard<'a, K, V, E> {
    fn settle(mut self, result: &Result<V, E>) {
        self.armed = false;
        let mut entries = self.inner.entries.lock();
        if !self.owns_slot(&entries) {
            return;
        }
        match result {
            Ok(value) => {
                let expires_at = self
                    .inner
                    .config
                    .refresh_control
                    .expires_at(self.inner.config.clock.now());
                entries.slots.insert(
                    self.key.clone(),
                    Slot::Ready {
                        value: value.clone(),
                        expires_at,
                    },
                );
            }
            Err(_) => {
                entries.slots.remove(self.key);
            }
        }
    }
}

impl<'a, K: Eq + Hash, V, E> LoadingGuard<'a, K, V, E> {
    fn owns_slot(&self, entries: &Entries<K, V, E>) -> bool {
        matches!(
            entries.slots.get(self.key),
            Some(Slot::Loading { generation, .. }) if *generation == self.generation
        )
    }
}

impl<'a, K: Eq + Hash, V, E> Drop for LoadingGuard<'a, K, V, E> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut entries = self.inner.entries.lock();
        if self.owns_slot(&entries) {
            entries.slots.remove(self.key);
        }
    }
}

//! Single-flight fetch deduplication.
//!
//! # Responsibilities
//! - Allow at most one in-flight fetch per key
//! - Fan the single outcome out to every concurrent requester
//! - Keep the fetch running when the request that started it goes away
//!
//! # Design Decisions
//! - The owner's fetch runs on a detached task; every caller, owner included,
//!   waits on the same `watch` channel
//! - The in-flight registration is removed by a drop guard, so a panicking
//!   fetch cannot wedge a key
//! - Failures are delivered to all waiters and never retained

use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::{FetchError, FetchResult};
use crate::observability::metrics;

type Outcome<T> = Option<FetchResult<T>>;

/// One fetch in progress: its completion signal, an episode id and the
/// number of callers currently waiting on it.
struct InFlightFetch<T> {
    episode: u64,
    outcome: watch::Receiver<Outcome<T>>,
    waiters: Arc<AtomicUsize>,
}

/// Point-in-time deduplicator statistics.
#[derive(Debug, Clone, Serialize)]
pub struct DedupStats {
    /// Keys with a fetch running.
    pub in_flight: usize,
    /// Callers attached to those fetches, owners included.
    pub waiters: usize,
}

/// Collapses concurrent fetches of the same key into one execution.
pub struct FetchDeduplicator<K, T> {
    inflight: Arc<DashMap<K, InFlightFetch<T>>>,
    episodes: AtomicU64,
}

impl<K, T> FetchDeduplicator<K, T>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inflight: Arc::new(DashMap::new()),
            episodes: AtomicU64::new(0),
        }
    }

    /// Run `fetch` for `key`, or join the fetch already running for it.
    ///
    /// `fetch` is only invoked when this caller becomes the owner. Dropping
    /// the returned future abandons the wait without affecting the fetch.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, fetch: F) -> FetchResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<T>> + Send + 'static,
    {
        let (mut outcome, waiters, owner) = match self.inflight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                let fetch = existing.get();
                (fetch.outcome.clone(), fetch.waiters.clone(), None)
            }
            Entry::Vacant(vacant) => {
                let episode = self.episodes.fetch_add(1, Ordering::Relaxed) + 1;
                let (tx, rx) = watch::channel(None);
                let waiters = Arc::new(AtomicUsize::new(0));
                vacant.insert(InFlightFetch {
                    episode,
                    outcome: rx.clone(),
                    waiters: waiters.clone(),
                });
                (rx, waiters, Some((episode, tx)))
            }
        };
        let _attached = WaiterGuard::attach(waiters);

        match owner {
            Some((episode, tx)) => {
                tracing::debug!(key = %key, episode, "Starting upstream fetch");
                let guard = InFlightGuard {
                    inflight: self.inflight.clone(),
                    key: key.clone(),
                    episode,
                };
                let fut = fetch();
                tokio::spawn(async move {
                    let result = fut.await;
                    tx.send_replace(Some(result));
                    drop(guard);
                });
            }
            None => {
                tracing::debug!(key = %key, "Joining in-flight fetch");
                metrics::record_dedup_waiter();
            }
        }

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(published) => match &*published {
                Some(result) => result.clone(),
                None => Err(FetchError::Internal("fetch outcome missing".into())),
            },
            Err(_) => {
                tracing::error!(key = %key, "In-flight fetch ended without publishing a result");
                Err(FetchError::Internal("in-flight fetch aborted".into()))
            }
        };
        result
    }

    /// Whether a fetch is currently running for `key`.
    pub fn is_in_flight(&self, key: &K) -> bool {
        self.inflight.contains_key(key)
    }

    pub fn stats(&self) -> DedupStats {
        let mut stats = DedupStats {
            in_flight: 0,
            waiters: 0,
        };
        for fetch in self.inflight.iter() {
            stats.in_flight += 1;
            stats.waiters += fetch.waiters.load(Ordering::Relaxed);
        }
        stats
    }
}

impl<K, T> Default for FetchDeduplicator<K, T>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Unregisters an episode when its fetch task finishes or unwinds.
struct InFlightGuard<K: Eq + Hash, T> {
    inflight: Arc<DashMap<K, InFlightFetch<T>>>,
    key: K,
    episode: u64,
}

impl<K: Eq + Hash, T> Drop for InFlightGuard<K, T> {
    fn drop(&mut self) {
        self.inflight
            .remove_if(&self.key, |_, fetch| fetch.episode == self.episode);
    }
}

/// Counts one caller as attached to a fetch until it returns or is dropped.
struct WaiterGuard(Arc<AtomicUsize>);

impl WaiterGuard {
    fn attach(waiters: Arc<AtomicUsize>) -> Self {
        waiters.fetch_add(1, Ordering::Relaxed);
        Self(waiters)
    }
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

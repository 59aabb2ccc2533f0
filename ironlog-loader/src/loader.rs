//! The batching, memoizing loader for one lane of one request.

use crate::cache::{CacheEntry, CacheStats, Lookup, RequestCache};
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::executor::{execute, BatchFetch};
use crate::outcome::Outcome;
use crate::window::{Batch, BatchWindow, Waiter};
use ironlog_data::{EntityKind, Key};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{oneshot, watch};
use tracing::{debug, trace};

/// Counters for one loader.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub cache: CacheStats,
    /// Executor calls issued so far.
    pub flushes: u64,
}

/// Clonable handle to a request-scoped loader over one [`BatchFetch`] lane.
///
/// `load` answers from the cache when it can; otherwise it registers the
/// key on the window of its kind and awaits the shared outcome. The first
/// registration on an idle window spawns a dispatcher task that waits for
/// the end of the current tick (or `batch_delay_ms`), drains the window,
/// runs one fetch, writes outcomes back and wakes every waiter. It keeps
/// draining until the window is empty, so a kind never has two fetches in
/// flight.
///
/// Dispatchers are spawned with `tokio::spawn`, so `load` must be called
/// from within a tokio runtime.
pub struct Loader<F: BatchFetch> {
    inner: Arc<LoaderInner<F>>,
}

impl<F: BatchFetch> Clone for Loader<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct LoaderInner<F: BatchFetch> {
    fetcher: F,
    config: LoaderConfig,
    state: Mutex<LoaderState<F::Value>>,
    /// Bumped by `flush`; cuts any dispatcher's batch delay short.
    flush_epoch: watch::Sender<u64>,
    /// Number of live dispatcher tasks.
    active: watch::Sender<usize>,
}

struct LoaderState<V> {
    cache: RequestCache<V>,
    windows: HashMap<EntityKind, BatchWindow<V>>,
    /// Completed flushes; stamps cache entries.
    tick: u64,
    closed: bool,
}

impl<F: BatchFetch> Loader<F> {
    pub fn new(fetcher: F, config: LoaderConfig) -> Self {
        let (active, _) = watch::channel(0);
        let (flush_epoch, _) = watch::channel(0);
        Self {
            inner: Arc::new(LoaderInner {
                fetcher,
                config,
                state: Mutex::new(LoaderState {
                    cache: RequestCache::new(),
                    windows: HashMap::new(),
                    tick: 0,
                    closed: false,
                }),
                flush_epoch,
                active,
            }),
        }
    }

    pub fn lane(&self) -> &'static str {
        self.inner.fetcher.lane()
    }

    /// Load one key.
    pub async fn load(&self, key: Key) -> Outcome<F::Value> {
        self.load_tracked(key).await.0
    }

    /// Like [`load`](Self::load), also reporting whether this call
    /// registered the key and so started the fetch that answered it.
    pub(crate) async fn load_tracked(&self, key: Key) -> (Outcome<F::Value>, bool) {
        let (pending, started) = {
            let mut state = self.inner.lock();
            match state.cache.lookup(&key) {
                Lookup::Hit(outcome) => {
                    trace!(lane = self.lane(), key = %key, "cache hit");
                    return (outcome, false);
                }
                Lookup::InFlight(pending) => (pending, false),
                Lookup::Miss => {
                    if state.closed {
                        return (Outcome::Error(LoadError::Closed), false);
                    }
                    let (tx, rx) = oneshot::channel();
                    let (ticket, pending) = state.cache.begin(key, rx);
                    let start_dispatcher = state
                        .windows
                        .entry(key.kind())
                        .or_insert_with(|| BatchWindow::new(key.kind()))
                        .register(key, Waiter { ticket, tx });
                    if start_dispatcher {
                        self.spawn_dispatcher(key.kind());
                    }
                    (pending, true)
                }
            }
        };
        // The sender only disappears if the dispatcher task was dropped
        // with the runtime.
        let outcome = pending.await.unwrap_or(Outcome::Error(LoadError::Closed));
        (outcome, started)
    }

    /// Load several keys, returning outcomes in input order.
    pub async fn load_many(&self, keys: &[Key]) -> Vec<Outcome<F::Value>> {
        futures_util::future::join_all(keys.iter().map(|key| self.load(*key))).await
    }

    /// Seed the cache with a value read at clear generation `since` (e.g.
    /// rows that came back as children of a relation). Keys already pending
    /// or cached are left alone, and so are keys cleared after `since`.
    pub fn prime_since(&self, key: Key, value: F::Value, since: u64) -> bool {
        let mut state = self.inner.lock();
        if state.closed {
            return false;
        }
        let tick = state.tick;
        state.cache.prime(key, value, tick, since)
    }

    /// Clear generation; advances on every `clear` and `clear_all`.
    pub fn generation(&self) -> u64 {
        self.inner.lock().cache.generation()
    }

    /// Forget `key`. Idempotent.
    ///
    /// A fetch already in flight for the key still answers its current
    /// waiters, but its outcome is not written back; the next `load`
    /// fetches again.
    pub fn clear(&self, key: &Key) -> bool {
        self.inner.lock().cache.clear(key)
    }

    /// Forget every key.
    pub fn clear_all(&self) -> usize {
        self.inner.lock().cache.clear_all()
    }

    /// The memoized entry for `key`, if any.
    pub fn cached(&self, key: &Key) -> Option<CacheEntry<F::Value>> {
        self.inner.lock().cache.entry(key).cloned()
    }

    /// Cut any configured batch delay short and wait until every window of
    /// this loader has drained.
    pub async fn flush(&self) {
        self.inner.flush_epoch.send_modify(|epoch| *epoch += 1);
        let mut active = self.inner.active.subscribe();
        // Err only if the sender is gone, which cannot outlive `self`.
        let _ = active.wait_for(|n| *n == 0).await;
    }

    /// Refuse new registrations. Keys already registered are still fetched.
    pub fn close(&self) {
        self.inner.lock().closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Keys waiting in open windows, all kinds combined.
    pub fn pending(&self) -> usize {
        self.inner
            .lock()
            .windows
            .values()
            .map(BatchWindow::pending_len)
            .sum()
    }

    pub fn stats(&self) -> LoaderStats {
        let state = self.inner.lock();
        LoaderStats {
            cache: state.cache.stats(),
            flushes: state.windows.values().map(BatchWindow::flushes).sum(),
        }
    }

    fn spawn_dispatcher(&self, kind: EntityKind) {
        let inner = Arc::clone(&self.inner);
        inner.active.send_modify(|n| *n += 1);
        // Subscribed before the task runs, so a flush issued in between is
        // still observed.
        let epoch = inner.flush_epoch.subscribe();
        tokio::spawn(async move {
            inner.dispatch(kind, epoch).await;
            inner.active.send_modify(|n| *n -= 1);
        });
    }
}

impl<F: BatchFetch> LoaderInner<F> {
    fn lock(&self) -> MutexGuard<'_, LoaderState<F::Value>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drain the window of `kind` until it stays empty.
    async fn dispatch(&self, kind: EntityKind, mut epoch: watch::Receiver<u64>) {
        loop {
            self.collect(&mut epoch).await;

            let batch = {
                let mut state = self.lock();
                let window = state
                    .windows
                    .entry(kind)
                    .or_insert_with(|| BatchWindow::new(kind));
                match window.take_batch(self.config.max_batch_size) {
                    Some(batch) => batch,
                    None => return,
                }
            };

            let Batch { keys, mut waiters } = batch;
            debug!(lane = self.fetcher.lane(), kind = %kind, keys = keys.len(), "flushing batch window");
            let outcomes = execute(&self.fetcher, kind, &keys).await;

            let deliveries = {
                let mut state = self.lock();
                state.tick += 1;
                let tick = state.tick;
                let mut deliveries = Vec::with_capacity(keys.len());
                for (key, outcome) in keys.iter().zip(outcomes) {
                    for waiter in waiters.remove(key).unwrap_or_default() {
                        state.cache.complete(*key, waiter.ticket, outcome.clone(), tick);
                        deliveries.push((waiter.tx, outcome.clone()));
                    }
                }
                deliveries
            };
            for (tx, outcome) in deliveries {
                // The waiter may have been dropped (cancelled resolver).
                let _ = tx.send(outcome);
            }
        }
    }

    /// Let the current window fill up.
    async fn collect(&self, epoch: &mut watch::Receiver<u64>) {
        let delay = self.config.batch_delay();
        if delay.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = epoch.changed() => {}
        }
    }
}

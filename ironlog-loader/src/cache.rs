//! Per-request memo of key -> outcome.

use crate::outcome::Outcome;
use futures_util::future::Shared;
use ironlog_data::Key;
use std::collections::HashMap;
use tokio::sync::oneshot;

/// Outcome that is still being fetched, shared by every caller waiting on
/// the same key.
pub(crate) type PendingOutcome<V> = Shared<oneshot::Receiver<Outcome<V>>>;

/// A memoized outcome.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: Key,
    pub outcome: Outcome<V>,
    /// Flush counter of the owning loader when the entry was written.
    pub inserted_at_tick: u64,
}

enum Slot<V> {
    Pending {
        ticket: u64,
        outcome: PendingOutcome<V>,
    },
    Ready(CacheEntry<V>),
}

pub(crate) enum Lookup<V> {
    Hit(Outcome<V>),
    InFlight(PendingOutcome<V>),
    Miss,
}

/// Hit/miss counters of one cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Request-scoped cache.
///
/// Each key is either pending (a fetch is registered or in flight) or
/// ready. Pending slots carry a ticket so a fetch that completes after its
/// key was cleared cannot write a stale outcome back.
///
/// Only `Value` and `NotFound` are memoized; `Error` outcomes free the slot
/// so the next load fetches again.
///
/// Every `clear` bumps a generation counter and stamps the key with it, so
/// a value obtained from somewhere other than this cache's own fetches can
/// be primed only if its key was not cleared since the value was read.
pub(crate) struct RequestCache<V> {
    slots: HashMap<Key, Slot<V>>,
    next_ticket: u64,
    hits: u64,
    misses: u64,
    generation: u64,
    cleared: HashMap<Key, u64>,
    cleared_all_at: u64,
}

impl<V: Clone> RequestCache<V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: HashMap::new(),
            next_ticket: 0,
            hits: 0,
            misses: 0,
            generation: 0,
            cleared: HashMap::new(),
            cleared_all_at: 0,
        }
    }

    /// Current clear generation.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn lookup(&mut self, key: &Key) -> Lookup<V> {
        match self.slots.get(key) {
            Some(Slot::Ready(entry)) => {
                self.hits += 1;
                Lookup::Hit(entry.outcome.clone())
            }
            Some(Slot::Pending { outcome, .. }) => {
                self.hits += 1;
                Lookup::InFlight(outcome.clone())
            }
            None => Lookup::Miss,
        }
    }

    /// Mark `key` as pending on `receiver`; returns the slot's ticket and
    /// the shared handle for the caller to await. Counts as a miss.
    pub(crate) fn begin(
        &mut self,
        key: Key,
        receiver: oneshot::Receiver<Outcome<V>>,
    ) -> (u64, PendingOutcome<V>) {
        use futures_util::FutureExt;

        self.misses += 1;
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let outcome = receiver.shared();
        self.slots.insert(
            key,
            Slot::Pending {
                ticket,
                outcome: outcome.clone(),
            },
        );
        (ticket, outcome)
    }

    /// Settle the pending slot for `key` if it still belongs to `ticket`.
    ///
    /// Returns `true` when the outcome was memoized.
    pub(crate) fn complete(&mut self, key: Key, ticket: u64, outcome: Outcome<V>, tick: u64) -> bool {
        match self.slots.get(&key) {
            Some(Slot::Pending { ticket: current, .. }) if *current == ticket => {}
            _ => return false,
        }
        if outcome.is_error() {
            self.slots.remove(&key);
            return false;
        }
        self.slots.insert(
            key,
            Slot::Ready(CacheEntry {
                key,
                outcome,
                inserted_at_tick: tick,
            }),
        );
        true
    }

    /// Seed a value for `key` read at clear generation `since`.
    ///
    /// Skipped when the key is already pending or cached, or when it (or the
    /// whole cache) was cleared after `since`.
    pub(crate) fn prime(&mut self, key: Key, value: V, tick: u64, since: u64) -> bool {
        if self.slots.contains_key(&key) || self.cleared_all_at > since {
            return false;
        }
        if self.cleared.get(&key).is_some_and(|at| *at > since) {
            return false;
        }
        self.slots.insert(
            key,
            Slot::Ready(CacheEntry {
                key,
                outcome: Outcome::Value(value),
                inserted_at_tick: tick,
            }),
        );
        true
    }

    pub(crate) fn entry(&self, key: &Key) -> Option<&CacheEntry<V>> {
        match self.slots.get(key) {
            Some(Slot::Ready(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Forget `key`, pending or ready. Idempotent.
    pub(crate) fn clear(&mut self, key: &Key) -> bool {
        self.generation += 1;
        self.cleared.insert(*key, self.generation);
        self.slots.remove(key).is_some()
    }

    pub(crate) fn clear_all(&mut self) -> usize {
        self.generation += 1;
        self.cleared_all_at = self.generation;
        self.cleared.clear();
        let removed = self.slots.len();
        self.slots.clear();
        removed
    }

    /// Number of memoized (ready) entries.
    pub(crate) fn len(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadError;

    fn pending(cache: &mut RequestCache<i32>, key: Key) -> (u64, oneshot::Sender<Outcome<i32>>) {
        let (tx, rx) = oneshot::channel();
        let (ticket, _) = cache.begin(key, rx);
        (ticket, tx)
    }

    #[test]
    fn test_miss_then_hit() {
        let mut cache = RequestCache::new();
        let key = Key::exercise(1);
        assert!(matches!(cache.lookup(&key), Lookup::Miss));

        let (ticket, _tx) = pending(&mut cache, key);
        assert!(matches!(cache.lookup(&key), Lookup::InFlight(_)));

        assert!(cache.complete(key, ticket, Outcome::Value(10), 1));
        assert!(matches!(cache.lookup(&key), Lookup::Hit(Outcome::Value(10))));
        assert_eq!(cache.entry(&key).map(|e| e.inserted_at_tick), Some(1));
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 2,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn test_not_found_is_memoized() {
        let mut cache = RequestCache::<i32>::new();
        let key = Key::exercise(2);
        let (ticket, _tx) = pending(&mut cache, key);
        assert!(cache.complete(key, ticket, Outcome::NotFound, 1));
        assert!(matches!(cache.lookup(&key), Lookup::Hit(Outcome::NotFound)));
    }

    #[test]
    fn test_errors_free_the_slot() {
        let mut cache = RequestCache::<i32>::new();
        let key = Key::exercise(3);
        let (ticket, _tx) = pending(&mut cache, key);
        assert!(!cache.complete(key, ticket, Outcome::Error(LoadError::Closed), 1));
        assert!(matches!(cache.lookup(&key), Lookup::Miss));
    }

    #[test]
    fn test_stale_ticket_does_not_write_back() {
        let mut cache = RequestCache::new();
        let key = Key::exercise(4);
        let (old_ticket, _old) = pending(&mut cache, key);

        assert!(cache.clear(&key));
        let (new_ticket, _new) = pending(&mut cache, key);

        assert!(!cache.complete(key, old_ticket, Outcome::Value(1), 1));
        assert!(matches!(cache.lookup(&key), Lookup::InFlight(_)));
        assert!(cache.complete(key, new_ticket, Outcome::Value(2), 2));
        assert!(matches!(cache.lookup(&key), Lookup::Hit(Outcome::Value(2))));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut cache = RequestCache::<i32>::new();
        assert!(!cache.clear(&Key::exercise(5)));
        let now = cache.generation();
        assert!(cache.prime(Key::exercise(5), 5, 0, now));
        assert!(!cache.prime(Key::exercise(5), 6, 0, now));
        assert!(cache.clear(&Key::exercise(5)));
        assert!(!cache.clear(&Key::exercise(5)));
        assert_eq!(cache.clear_all(), 0);
    }

    #[test]
    fn test_prime_skips_keys_cleared_since_read() {
        let mut cache = RequestCache::new();
        let read_at = cache.generation();

        cache.clear(&Key::exercise(6));
        assert!(!cache.prime(Key::exercise(6), 1, 0, read_at));
        assert!(cache.prime(Key::exercise(7), 1, 0, read_at));

        let read_at = cache.generation();
        assert!(cache.prime(Key::exercise(6), 2, 0, read_at));

        cache.clear_all();
        assert!(!cache.prime(Key::exercise(8), 3, 0, read_at));
    }

    #[test]
    fn test_lookup_alone_is_not_a_miss() {
        let mut cache = RequestCache::<i32>::new();
        assert!(matches!(cache.lookup(&Key::exercise(9)), Lookup::Miss));
        assert_eq!(cache.stats().misses, 0);
        let _ = pending(&mut cache, Key::exercise(9));
        assert_eq!(cache.stats().misses, 1);
    }
}

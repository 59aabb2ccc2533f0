//! Batch windows: where keys pile up until the dispatcher flushes them.

use crate::outcome::Outcome;
use ironlog_data::{EntityKind, Key};
use std::collections::HashMap;
use tokio::sync::oneshot;

/// A caller waiting on one key of a batch.
pub(crate) struct Waiter<V> {
    /// Cache ticket the outcome is written back under.
    pub ticket: u64,
    pub tx: oneshot::Sender<Outcome<V>>,
}

/// Keys of one kind collected within one window.
///
/// `keys` is deduplicated and in order of first registration; a key may
/// have several waiters when it was cleared and re-requested before the
/// window flushed.
pub(crate) struct Batch<V> {
    pub keys: Vec<Key>,
    pub waiters: HashMap<Key, Vec<Waiter<V>>>,
}

impl<V> Batch<V> {
    fn new() -> Self {
        Self {
            keys: Vec::new(),
            waiters: HashMap::new(),
        }
    }

    fn push(&mut self, key: Key, waiter: Waiter<V>) {
        let waiters = self.waiters.entry(key).or_default();
        if waiters.is_empty() {
            self.keys.push(key);
        }
        waiters.push(waiter);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// The coalescing window of one entity kind in one lane.
///
/// At most one dispatcher drains a window at a time (`dispatching`), which
/// is what keeps a kind to a single in-flight fetch. Keys registered while
/// a batch is in flight land in the fresh `pending` batch and go out with
/// the next flush.
pub(crate) struct BatchWindow<V> {
    kind: EntityKind,
    pending: Batch<V>,
    dispatching: bool,
    flushes: u64,
}

impl<V> BatchWindow<V> {
    pub(crate) fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            pending: Batch::new(),
            dispatching: false,
            flushes: 0,
        }
    }

    /// Add a waiter for `key`.
    ///
    /// Returns `true` when no dispatcher is draining this window and the
    /// caller must start one.
    pub(crate) fn register(&mut self, key: Key, waiter: Waiter<V>) -> bool {
        debug_assert_eq!(key.kind(), self.kind);
        self.pending.push(key, waiter);
        if self.dispatching {
            false
        } else {
            self.dispatching = true;
            true
        }
    }

    /// Close the current window and hand over up to `max` keys.
    ///
    /// Returns `None` when nothing is pending, which also releases the
    /// dispatcher role.
    pub(crate) fn take_batch(&mut self, max: usize) -> Option<Batch<V>> {
        if self.pending.is_empty() {
            self.dispatching = false;
            return None;
        }
        let batch = if self.pending.len() <= max {
            std::mem::replace(&mut self.pending, Batch::new())
        } else {
            let rest = self.pending.keys.split_off(max);
            let mut batch = Batch::new();
            for key in std::mem::replace(&mut self.pending.keys, rest) {
                if let Some(waiters) = self.pending.waiters.remove(&key) {
                    batch.keys.push(key);
                    batch.waiters.insert(key, waiters);
                }
            }
            batch
        };
        self.flushes += 1;
        Some(batch)
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub(crate) fn flushes(&self) -> u64 {
        self.flushes
    }
}

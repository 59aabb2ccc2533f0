//! In-memory [`Storage`] for tests.

use crate::error::DataError;
use crate::key::{EntityKind, Key};
use crate::record::{OwnerLink, Record, Relation};
use crate::storage::{Storage, StorageFuture};
use dashmap::{DashMap, DashSet};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A storage call recorded by [`MockStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    FetchMany { kind: EntityKind, keys: Vec<Key> },
    OwnerLinks { kind: EntityKind, keys: Vec<Key> },
    Children { relation: Relation, parents: Vec<Key> },
}

/// In-memory mock storage.
///
/// Holds records in a `DashMap` and records every call it receives, so
/// tests can assert how many bulk fetches the loader issued and with which
/// keys. Cloning shares the same records and call log.
///
/// # Example
///
/// ```
/// use ironlog_data::{MockStorage, Record, WorkoutRoutine, UserId};
///
/// let mock = MockStorage::new();
/// mock.insert(WorkoutRoutine {
///     id: 1,
///     user_id: UserId(7),
///     name: "Push".into(),
///     active: true,
/// });
/// assert_eq!(mock.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockStorage {
    records: Arc<DashMap<Key, Record>>,
    failing: Arc<DashSet<EntityKind>>,
    calls: Arc<Mutex<Vec<StorageCall>>>,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record.
    pub fn insert(&self, record: impl Into<Record>) {
        let record = record.into();
        self.records.insert(record.key(), record);
    }

    /// Remove a record, as a soft delete would hide it.
    pub fn remove(&self, key: &Key) -> Option<Record> {
        self.records.remove(key).map(|(_, record)| record)
    }

    pub fn get(&self, key: &Key) -> Option<Record> {
        self.records.get(key).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Make every call touching `kind` fail with a database error.
    pub fn fail_kind(&self, kind: EntityKind) {
        self.failing.insert(kind);
    }

    /// Undo [`fail_kind`](Self::fail_kind).
    pub fn heal_kind(&self, kind: EntityKind) {
        self.failing.remove(&kind);
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Key lists of every `fetch_many` call for `kind`.
    pub fn fetch_many_calls(&self, kind: EntityKind) -> Vec<Vec<Key>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StorageCall::FetchMany { kind: k, keys } if k == kind => Some(keys),
                _ => None,
            })
            .collect()
    }

    /// Key lists of every `fetch_owner_links` call for `kind`.
    pub fn owner_link_calls(&self, kind: EntityKind) -> Vec<Vec<Key>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StorageCall::OwnerLinks { kind: k, keys } if k == kind => Some(keys),
                _ => None,
            })
            .collect()
    }

    /// Parent lists of every `fetch_children` call for `relation`.
    pub fn children_calls(&self, relation: Relation) -> Vec<Vec<Key>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StorageCall::Children { relation: r, parents } if r == relation => Some(parents),
                _ => None,
            })
            .collect()
    }

    fn record_call(&self, call: StorageCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check_failing(&self, kind: EntityKind, keys: usize) -> Result<(), DataError> {
        if self.failing.contains(&kind) {
            let cause = std::io::Error::other("injected failure");
            return Err(DataError::query(kind, keys, cause));
        }
        Ok(())
    }

    fn lookup(&self, kind: EntityKind, keys: &[Key]) -> Result<HashMap<Key, Record>, DataError> {
        self.check_failing(kind, keys.len())?;
        Ok(keys
            .iter()
            .filter(|key| key.kind() == kind)
            .filter_map(|key| self.get(key).map(|record| (*key, record)))
            .collect())
    }
}

impl Storage for MockStorage {
    fn fetch_many<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Record>> {
        self.record_call(StorageCall::FetchMany {
            kind,
            keys: keys.to_vec(),
        });
        let result = self.lookup(kind, keys);
        Box::pin(async move { result })
    }

    fn fetch_owner_links<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, OwnerLink>> {
        self.record_call(StorageCall::OwnerLinks {
            kind,
            keys: keys.to_vec(),
        });
        let result = self.lookup(kind, keys).map(|records| {
            records
                .into_iter()
                .map(|(key, record)| (key, record.owner_link()))
                .collect()
        });
        Box::pin(async move { result })
    }

    fn fetch_children<'a>(
        &'a self,
        relation: Relation,
        parents: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Vec<Record>>> {
        self.record_call(StorageCall::Children {
            relation,
            parents: parents.to_vec(),
        });
        let result = self.check_failing(relation.child_kind(), parents.len()).map(|()| {
            let mut out: HashMap<Key, Vec<Record>> = HashMap::new();
            for entry in self.records.iter() {
                if let Some(parent) = relation.parent_of(entry.value()) {
                    if parents.contains(&parent) {
                        out.entry(parent).or_default().push(entry.value().clone());
                    }
                }
            }
            for children in out.values_mut() {
                children.sort_by_key(|r| r.key().id());
            }
            out
        });
        Box::pin(async move { result })
    }
}

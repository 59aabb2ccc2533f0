//! Batch sources and the executor that runs one flushed batch.
//!
//! A [`BatchFetch`] is one *lane* of the loader: records, ownership links,
//! or the children of a relation. Each lane answers a whole batch with a
//! single storage call.

use crate::error::LoadError;
use crate::outcome::Outcome;
use crate::reconcile::reconcile;
use ironlog_data::{EntityKind, Key, OwnerLink, Record, Relation, Storage, StorageFuture};
use std::collections::HashMap;
use std::sync::Arc;

/// A bulk source the loader can batch against.
pub trait BatchFetch: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    /// Lane name, for logs.
    fn lane(&self) -> &'static str;

    /// Fetch every key of `kind` in `keys` with one underlying call.
    fn fetch<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Self::Value>>;
}

/// Full rows, via [`Storage::fetch_many`].
pub struct RecordFetch {
    storage: Arc<dyn Storage>,
}

impl RecordFetch {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl BatchFetch for RecordFetch {
    type Value = Record;

    fn lane(&self) -> &'static str {
        "record"
    }

    fn fetch<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Record>> {
        self.storage.fetch_many(kind, keys)
    }
}

/// One-hop ownership links, via [`Storage::fetch_owner_links`].
pub struct LinkFetch {
    storage: Arc<dyn Storage>,
}

impl LinkFetch {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }
}

impl BatchFetch for LinkFetch {
    type Value = OwnerLink;

    fn lane(&self) -> &'static str {
        "owner_link"
    }

    fn fetch<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, OwnerLink>> {
        self.storage.fetch_owner_links(kind, keys)
    }
}

/// Child lists of one relation, keyed by parent, via
/// [`Storage::fetch_children`].
///
/// Parents without children resolve to an empty list rather than
/// `NotFound`; whether the parent exists is the gate's concern.
pub struct ChildrenFetch {
    storage: Arc<dyn Storage>,
    relation: Relation,
}

impl ChildrenFetch {
    pub fn new(storage: Arc<dyn Storage>, relation: Relation) -> Self {
        Self { storage, relation }
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }
}

impl BatchFetch for ChildrenFetch {
    type Value = Vec<Record>;

    fn lane(&self) -> &'static str {
        self.relation.as_str()
    }

    fn fetch<'a>(
        &'a self,
        _kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Vec<Record>>> {
        Box::pin(async move {
            let mut children = self.storage.fetch_children(self.relation, keys).await?;
            for key in keys {
                children.entry(*key).or_default();
            }
            Ok(children)
        })
    }
}

/// Run one flushed batch and reconcile it into per-key outcomes.
///
/// A storage failure fails the whole batch: every key gets the same
/// `Error(Storage)`. Nothing is retried here.
pub(crate) async fn execute<F: BatchFetch>(
    fetcher: &F,
    kind: EntityKind,
    keys: &[Key],
) -> Vec<Outcome<F::Value>> {
    match fetcher.fetch(kind, keys).await {
        Ok(found) => reconcile(keys, found),
        Err(err) => {
            tracing::error!(
                lane = fetcher.lane(),
                kind = %kind,
                keys = keys.len(),
                error = %err,
                "batch fetch failed"
            );
            let err = LoadError::from(err);
            keys.iter().map(|_| Outcome::Error(err.clone())).collect()
        }
    }
}

//! The storage contract consumed by the loader.
//!
//! [`Storage`] is the only seam between the loader and the database. It is
//! defined here, in a crate with no driver dependency, so adapters such as
//! `ironlog-data-sqlx` depend on the contract and never the other way round.

use crate::error::DataError;
use crate::key::{EntityKind, Key, UserId};
use crate::record::{OwnerLink, Record, Relation};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every [`Storage`] method.
pub type StorageFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, DataError>> + Send + 'a>>;

/// Side-effect-free bulk reads against the relational store.
///
/// Every method receives a non-empty, deduplicated slice of keys of a
/// single kind and must answer it with exactly one underlying query.
/// Absent (or soft-deleted) rows are simply missing from the returned map;
/// the map carries no ordering.
///
/// # Invalidation contract
///
/// Mutations live outside this trait. An adapter's write helpers must
/// report every key whose cached data they may have staled, including the
/// keys touched by cascades and the parent keys whose child lists changed,
/// so callers can pass them to the request context's `clear_many`.
pub trait Storage: Send + Sync + 'static {
    /// Fetch all rows of `kind` whose id is in `keys`.
    fn fetch_many<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Record>>;

    /// Fetch the one-hop ownership link of each key without loading the
    /// full row.
    fn fetch_owner_links<'a>(
        &'a self,
        kind: EntityKind,
        keys: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, OwnerLink>>;

    /// Fetch the children of each parent under `relation`.
    ///
    /// Parents with no children may be omitted or mapped to an empty list.
    fn fetch_children<'a>(
        &'a self,
        relation: Relation,
        parents: &'a [Key],
    ) -> StorageFuture<'a, HashMap<Key, Vec<Record>>>;

    /// Resolve the user owning the aggregate root above `key`.
    ///
    /// Returns `None` when the record or any intermediate record is
    /// missing. The default walks [`fetch_owner_links`](Self::fetch_owner_links)
    /// one hop at a time; adapters may override it with a single join.
    fn fetch_owner_chain<'a>(&'a self, key: Key) -> StorageFuture<'a, Option<UserId>> {
        Box::pin(async move {
            let mut current = key;
            for _ in 0..=EntityKind::MAX_OWNER_HOPS {
                let mut links = self.fetch_owner_links(current.kind(), &[current]).await?;
                match links.remove(&current) {
                    Some(OwnerLink::Owner(user)) => return Ok(Some(user)),
                    Some(OwnerLink::Parent(parent)) => current = parent,
                    None => return Ok(None),
                }
            }
            Ok(None)
        })
    }
}

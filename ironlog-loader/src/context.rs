//! The request context: one principal, one gate, one set of loaders.

use crate::cache::CacheEntry;
use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::executor::{ChildrenFetch, LinkFetch, RecordFetch};
use crate::gate::{AccessDecision, AuthorizationGate, DenyReason};
use crate::loader::{Loader, LoaderStats};
use crate::outcome::Outcome;
use crate::principal::Principal;
use futures_util::future::join_all;
use ironlog_data::{Entity, EntityKind, Key, Record, Relation, Storage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use uuid::Uuid;

/// Per-lane counters of a request context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextStats {
    pub records: LoaderStats,
    pub links: LoaderStats,
    pub children: HashMap<Relation, LoaderStats>,
}

impl ContextStats {
    /// Storage calls issued across every lane.
    pub fn total_flushes(&self) -> u64 {
        self.records.flushes
            + self.links.flushes
            + self.children.values().map(|s| s.flushes).sum::<u64>()
    }
}

/// Everything one inbound request loads through.
///
/// Built by the transport boundary via
/// [`LoaderFactory::new_request_context`](crate::LoaderFactory::new_request_context),
/// threaded explicitly to every resolver (it is a cheap clonable handle),
/// and torn down when the response is complete. Caches and windows belong
/// to exactly one context; two contexts never share them, even for the
/// same principal.
///
/// Every load passes the [`AuthorizationGate`] first, then the request
/// cache, then the batch window of the key's kind.
///
/// ```ignore
/// let ctx = factory.new_request_context(Principal::from_claims(claims));
///
/// let sessions = ctx.load_many(&session_keys).await;
/// let exercises = ctx.load_children(Relation::SessionExercises, session_key).await;
///
/// // after a mutation
/// let stale = storage.update_exercise_notes(44, "felt heavy").await?;
/// ctx.clear_many(stale);
///
/// ctx.teardown().await;
/// ```
#[derive(Clone)]
pub struct RequestContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    request_id: Uuid,
    created_at: Instant,
    gate: AuthorizationGate,
    records: Loader<RecordFetch>,
    links: Loader<LinkFetch>,
    children: HashMap<Relation, Loader<ChildrenFetch>>,
}

impl RequestContext {
    pub fn new(
        principal: Option<Principal>,
        storage: Arc<dyn Storage>,
        config: LoaderConfig,
    ) -> Self {
        let links = Loader::new(LinkFetch::new(Arc::clone(&storage)), config.clone());
        let records = Loader::new(RecordFetch::new(Arc::clone(&storage)), config.clone());
        let children = Relation::ALL
            .into_iter()
            .map(|relation| {
                let fetch = ChildrenFetch::new(Arc::clone(&storage), relation);
                (relation, Loader::new(fetch, config.clone()))
            })
            .collect();
        let request_id = Uuid::new_v4();
        debug!(
            request_id = %request_id,
            user = ?principal.as_ref().map(Principal::user_id),
            "request context created"
        );
        Self {
            inner: Arc::new(ContextInner {
                request_id,
                created_at: Instant::now(),
                gate: AuthorizationGate::new(principal, links.clone()),
                records,
                links,
                children,
            }),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.inner.request_id
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.inner.gate.principal()
    }

    pub fn gate(&self) -> &AuthorizationGate {
        &self.inner.gate
    }

    /// Run the authorization gate for `key` without loading it.
    pub async fn check(&self, key: Key) -> Result<AccessDecision, LoadError> {
        self.inner.gate.check(key).await
    }

    /// Load one record.
    pub async fn load(&self, key: Key) -> Outcome<Record> {
        if let Some(denied) = self.authorize(key).await {
            return denied;
        }
        self.inner.records.load(key).await
    }

    /// Load several records; outcomes come back in the order of `keys`.
    pub async fn load_many(&self, keys: &[Key]) -> Vec<Outcome<Record>> {
        join_all(keys.iter().map(|key| self.load(*key))).await
    }

    /// Load a caller-supplied id. Unparseable ids fail before anything is
    /// registered.
    pub async fn load_id(&self, kind: EntityKind, raw: &str) -> Outcome<Record> {
        match Key::parse(kind, raw) {
            Ok(key) => self.load(key).await,
            Err(err) => {
                trace!(kind = %kind, raw, "malformed key");
                Outcome::Error(err.into())
            }
        }
    }

    /// Load one typed record by id.
    pub async fn load_entity<E: Entity>(&self, id: i64) -> Outcome<E> {
        self.load(Key::new(E::KIND, id))
            .await
            .and_then(|record| match E::from_record(record) {
                Some(entity) => Outcome::Value(entity),
                None => Outcome::NotFound,
            })
    }

    /// Load the children of `parent` under `relation`.
    ///
    /// Authorization is checked on the parent; children share its owner.
    /// Rows from a fetch this call started also seed the record and link
    /// caches, so loading one of them afterwards does not hit storage. Rows
    /// answered from the cache, or whose key was cleared while the fetch
    /// ran, seed nothing.
    pub async fn load_children(&self, relation: Relation, parent: Key) -> Outcome<Vec<Record>> {
        if parent.kind() != relation.parent_kind() {
            return Outcome::Error(LoadError::MalformedKey {
                kind: relation.parent_kind(),
                raw: parent.to_string(),
            });
        }
        if let Some(denied) = self.authorize(parent).await {
            return denied;
        }
        let Some(loader) = self.inner.children.get(&relation) else {
            return Outcome::Error(LoadError::Closed);
        };
        let links_at = self.inner.links.generation();
        let records_at = self.inner.records.generation();
        let (outcome, fetched) = loader.load_tracked(parent).await;
        if let (Outcome::Value(children), true) = (&outcome, fetched) {
            for child in children {
                self.inner
                    .links
                    .prime_since(child.key(), child.owner_link(), links_at);
                self.inner
                    .records
                    .prime_since(child.key(), child.clone(), records_at);
            }
        }
        outcome
    }

    /// Typed variant of [`load_children`](Self::load_children).
    pub async fn load_children_of<E: Entity>(
        &self,
        relation: Relation,
        parent: Key,
    ) -> Outcome<Vec<E>> {
        self.load_children(relation, parent)
            .await
            .map(|children| children.into_iter().filter_map(E::from_record).collect())
    }

    /// Evict `key` from every lane: its record, its ownership link, and
    /// any child list keyed by it. Idempotent.
    pub fn clear(&self, key: Key) {
        let mut removed = self.inner.records.clear(&key);
        removed |= self.inner.links.clear(&key);
        for (relation, loader) in &self.inner.children {
            if relation.parent_kind() == key.kind() {
                removed |= loader.clear(&key);
            }
        }
        trace!(key = %key, removed, "cache cleared");
    }

    /// Evict a mutation's stale set.
    pub fn clear_many(&self, keys: impl IntoIterator<Item = Key>) {
        for key in keys {
            self.clear(key);
        }
    }

    /// Evict everything cached for this request.
    pub fn clear_all(&self) {
        let mut removed = self.inner.records.clear_all() + self.inner.links.clear_all();
        for loader in self.inner.children.values() {
            removed += loader.clear_all();
        }
        debug!(request_id = %self.inner.request_id, removed, "cache cleared");
    }

    /// The memoized record outcome for `key`, if any.
    pub fn cached(&self, key: &Key) -> Option<CacheEntry<Record>> {
        self.inner.records.cached(key)
    }

    /// Force every open window to flush now and wait until all lanes have
    /// drained.
    pub async fn flush(&self) {
        futures_util::join!(
            self.inner.records.flush(),
            self.inner.links.flush(),
            join_all(self.inner.children.values().map(Loader::flush)),
        );
    }

    pub fn is_closed(&self) -> bool {
        self.inner.records.is_closed()
    }

    pub fn stats(&self) -> ContextStats {
        ContextStats {
            records: self.inner.records.stats(),
            links: self.inner.links.stats(),
            children: self
                .inner
                .children
                .iter()
                .map(|(relation, loader)| (*relation, loader.stats()))
                .collect(),
        }
    }

    /// End of request.
    ///
    /// Closes every lane so no new window can open, lets windows that were
    /// already registered finish (their results still reach any resolver
    /// that is waiting), then drops all cached data.
    pub async fn teardown(self) -> ContextStats {
        self.inner.records.close();
        self.inner.links.close();
        for loader in self.inner.children.values() {
            loader.close();
        }
        self.flush().await;
        let stats = self.stats();
        self.clear_all();
        debug!(
            request_id = %self.inner.request_id,
            elapsed_ms = self.elapsed().as_millis() as u64,
            flushes = stats.total_flushes(),
            "request context torn down"
        );
        stats
    }

    /// Gate `key`, mapping denials onto outcomes.
    ///
    /// A denial because the record itself is missing reads as `NotFound`;
    /// every other denial is an error. Denials are never cached.
    async fn authorize<T>(&self, key: Key) -> Option<Outcome<T>> {
        match self.inner.gate.check(key).await {
            Ok(AccessDecision::Allow) => None,
            Ok(AccessDecision::Deny(DenyReason::NotFound)) => Some(Outcome::NotFound),
            Ok(AccessDecision::Deny(DenyReason::Unauthenticated)) => {
                Some(Outcome::Error(LoadError::Unauthenticated))
            }
            Ok(AccessDecision::Deny(_)) => Some(Outcome::Error(LoadError::AccessDenied { key })),
            Err(err) => Some(Outcome::Error(err)),
        }
    }
}

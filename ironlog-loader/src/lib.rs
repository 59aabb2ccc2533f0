//! Per-request batched loading with ownership-based authorization.
//!
//! A graph-shaped response asks for the same kind of record from many
//! sibling resolvers at once. This crate turns those lookups into one bulk
//! storage call per kind per window, remembers every answer for the rest of
//! the request, and refuses to hand out records the caller does not own.
//!
//! # Setup
//!
//! ```ignore
//! use ironlog_data_sqlx::SqlxStorage;
//! use ironlog_loader::{LoaderConfig, LoaderFactory, Principal};
//!
//! let config = LoaderConfig::from_yaml_str(&std::fs::read_to_string("application.yaml")?)?;
//! let storage = SqlxStorage::connect("sqlite://ironlog.db").await?;
//! let factory = LoaderFactory::new(storage, config)?;
//!
//! // per inbound request
//! let ctx = factory.new_request_context(Principal::from_claims(claims));
//! let session = ctx.load(Key::workout_session(7)).await.into_optional()?;
//! ctx.teardown().await;
//! ```
//!
//! # Architecture
//!
//! - **[`LoaderFactory`]** holds the storage handle and configuration and
//!   builds one [`RequestContext`] per request. It has no cache.
//! - **[`RequestContext`]** owns the principal, the [`AuthorizationGate`]
//!   and one [`Loader`] per lane: records, ownership links, and the
//!   children of each [`Relation`](ironlog_data::Relation).
//! - **[`Loader`]** is the batch window plus request cache for one lane.
//!   Any [`BatchFetch`] can back it.
//! - **[`AuthorizationGate`]** walks ownership links (through the link
//!   lane, so they batch and memoize too) and decides per call.
//!
//! # Invalidation
//!
//! Nothing expires on its own; a context lives for one request. After a
//! mutation the caller clears exactly the keys it made stale:
//!
//! ```ignore
//! let stale = storage.update_exercise_notes(44, "felt heavy").await?;
//! ctx.clear_many(stale);
//! ```
//!
//! Clearing a key that is still being fetched lets current waiters receive
//! that fetch's result but keeps it out of the cache.

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod factory;
pub mod gate;
pub mod loader;
pub mod outcome;
pub mod principal;
pub mod reconcile;
pub(crate) mod window;

pub use cache::{CacheEntry, CacheStats};
pub use config::{ConfigError, LoaderConfig};
pub use context::{ContextStats, RequestContext};
pub use error::LoadError;
pub use executor::{BatchFetch, ChildrenFetch, LinkFetch, RecordFetch};
pub use factory::LoaderFactory;
pub use gate::{AccessDecision, AuthorizationGate, DenyReason};
pub use loader::{Loader, LoaderStats};
pub use outcome::Outcome;
pub use principal::Principal;
pub use reconcile::reconcile;

pub mod prelude {
    //! Re-exports of the most commonly used loader types.
    pub use crate::{
        AccessDecision, LoadError, LoaderConfig, LoaderFactory, Outcome, Principal, RequestContext,
    };
    pub use ironlog_data::prelude::*;
}

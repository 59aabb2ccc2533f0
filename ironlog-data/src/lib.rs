//! # ironlog-data: data contracts for the ironlog loader
//!
//! This crate defines what the loader batches and what it asks the store
//! for, without depending on any database driver:
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Key`] / [`EntityKind`] | The unit of batching: an entity kind plus an id |
//! | [`Entity`] + record structs | Typed rows (`WorkoutRoutine`, `Exercise`, ...) |
//! | [`Record`] | Kind-erased row as returned by storage |
//! | [`OwnerLink`] | One hop of an ownership chain |
//! | [`Relation`] | One-to-many relationships loaded by parent key |
//! | [`Storage`] | Bulk-read contract implemented by adapters |
//! | [`MockStorage`] | In-memory storage that records every call |
//!
//! Adapters (e.g. `ironlog-data-sqlx`) depend on this crate; the loader
//! depends on this crate only.

pub mod entity;
pub mod error;
pub mod key;
pub mod mock;
pub mod record;
pub mod storage;

pub use entity::{Entity, Exercise, ExerciseRoutine, SetEntry, WorkoutRoutine, WorkoutSession};
pub use error::DataError;
pub use key::{EntityKind, Key, KeyParseError, UserId};
pub use mock::{MockStorage, StorageCall};
pub use record::{OwnerLink, Record, Relation};
pub use storage::{Storage, StorageFuture};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{Entity, EntityKind, Key, OwnerLink, Record, Relation, Storage, UserId};
}

//! SQLite adapter for the ironlog [`Storage`](ironlog_data::Storage) contract.
//!
//! [`SqlxStorage`] answers every batch with one `IN (...)` query and hides
//! soft-deleted rows. Its mutation helpers return the keys they staled:
//!
//! ```ignore
//! let stale = storage.soft_delete_workout_session(3).await?;
//! ctx.clear_many(stale);
//! ```

pub mod error;
pub mod schema;
pub mod store;

pub use error::{SqlxErrorExt, SqlxResult};
pub use store::SqlxStorage;

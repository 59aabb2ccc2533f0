use ironlog_data::{DataError, EntityKind};

/// Attaches storage context to a `sqlx::Error`.
///
/// The orphan rule rules out `From<sqlx::Error> for DataError` here, and a
/// bare conversion would lose which table and batch failed anyway.
pub trait SqlxErrorExt {
    /// A statement over `keys` rows of `kind` failed.
    fn for_query(self, kind: EntityKind, keys: usize) -> DataError;

    /// Pool, transaction or schema failure not tied to one table.
    fn unavailable(self) -> DataError;
}

impl SqlxErrorExt for sqlx::Error {
    fn for_query(self, kind: EntityKind, keys: usize) -> DataError {
        DataError::query(kind, keys, self)
    }

    fn unavailable(self) -> DataError {
        DataError::connection(self)
    }
}

pub type SqlxResult<T> = Result<T, DataError>;

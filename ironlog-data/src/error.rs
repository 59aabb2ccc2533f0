use crate::key::{EntityKind, Key};
use std::error::Error;
use std::fmt;

type BoxError = Box<dyn Error + Send + Sync>;

/// Failures of a [`Storage`](crate::Storage) call or a mutation helper.
///
/// A bulk read never reports a missing key as an error (absent keys are
/// simply left out of its map), so `NotFound` only comes from mutations
/// that target one row.
#[derive(Debug)]
pub enum DataError {
    /// The row a mutation targeted does not exist or is soft-deleted.
    NotFound(Key),
    /// A query over `keys` keys of `kind` failed.
    Query {
        kind: EntityKind,
        keys: usize,
        source: BoxError,
    },
    /// The backend could not be reached or a transaction could not be
    /// opened or committed.
    Connection(BoxError),
}

impl DataError {
    pub fn query(kind: EntityKind, keys: usize, source: impl Error + Send + Sync + 'static) -> Self {
        DataError::Query {
            kind,
            keys,
            source: Box::new(source),
        }
    }

    pub fn connection(source: impl Error + Send + Sync + 'static) -> Self {
        DataError::Connection(Box::new(source))
    }

    /// Entity kind the failure concerns, when there is one.
    pub fn kind(&self) -> Option<EntityKind> {
        match self {
            DataError::NotFound(key) => Some(key.kind()),
            DataError::Query { kind, .. } => Some(*kind),
            DataError::Connection(_) => None,
        }
    }
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataError::NotFound(key) => write!(f, "{key} does not exist"),
            DataError::Query { kind, keys, source } => {
                write!(f, "{kind} query over {keys} keys failed: {source}")
            }
            DataError::Connection(source) => write!(f, "storage unavailable: {source}"),
        }
    }
}

impl Error for DataError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DataError::NotFound(_) => None,
            DataError::Query { source, .. } | DataError::Connection(source) => Some(source.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_error_names_kind_and_batch() {
        let err = DataError::query(
            EntityKind::SetEntry,
            3,
            std::io::Error::other("disk I/O error"),
        );
        assert_eq!(err.kind(), Some(EntityKind::SetEntry));
        assert_eq!(
            err.to_string(),
            "set_entry query over 3 keys failed: disk I/O error"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_not_found_carries_key() {
        let err = DataError::NotFound(Key::exercise(44));
        assert_eq!(err.kind(), Some(EntityKind::Exercise));
        assert_eq!(err.to_string(), "exercise:44 does not exist");
        assert!(err.source().is_none());
    }
}

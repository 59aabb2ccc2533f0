//! Error taxonomy for loader operations.

use ironlog_data::{DataError, EntityKind, Key, KeyParseError};
use std::fmt;
use std::sync::Arc;

/// Errors surfaced to field resolvers.
///
/// `Unauthenticated` and `AccessDenied` come from the authorization gate
/// and never reach storage. `Storage` is shared by every key of the failed
/// batch, hence the `Arc`.
#[derive(Debug, Clone)]
pub enum LoadError {
    /// The request carries no principal.
    Unauthenticated,
    /// The principal does not own the resource, or its ownership chain is
    /// broken.
    AccessDenied { key: Key },
    /// The key is absent from storage.
    NotFound { key: Key },
    /// The bulk fetch for the key's batch failed.
    Storage(Arc<DataError>),
    /// The caller supplied an id the entity kind cannot parse.
    MalformedKey { kind: EntityKind, raw: String },
    /// The request context has been torn down.
    Closed,
}

impl LoadError {
    /// Whether this is an expected, recoverable outcome that calling code
    /// turns into a domain message (as opposed to an unexpected failure).
    pub fn is_expected(&self) -> bool {
        !matches!(self, LoadError::Storage(_) | LoadError::Closed)
    }

    /// Message safe to show to API clients.
    ///
    /// Storage failures are opaque; their detail only goes to the logs.
    pub fn public_message(&self) -> String {
        match self {
            LoadError::Unauthenticated => "Unauthenticated".to_string(),
            LoadError::AccessDenied { .. } => "Access denied".to_string(),
            LoadError::NotFound { key } => format!("{} not found", key.kind()),
            LoadError::MalformedKey { kind, .. } => format!("Invalid {kind} id"),
            LoadError::Storage(_) | LoadError::Closed => "Internal error".to_string(),
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Unauthenticated => write!(f, "Unauthenticated"),
            LoadError::AccessDenied { key } => write!(f, "Access denied to {key}"),
            LoadError::NotFound { key } => write!(f, "Not found: {key}"),
            LoadError::Storage(err) => write!(f, "Storage error: {err}"),
            LoadError::MalformedKey { kind, raw } => {
                write!(f, "Malformed {kind} id: {raw:?}")
            }
            LoadError::Closed => write!(f, "Request context closed"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Storage(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<KeyParseError> for LoadError {
    fn from(err: KeyParseError) -> Self {
        LoadError::MalformedKey {
            kind: err.kind,
            raw: err.raw,
        }
    }
}

impl From<DataError> for LoadError {
    fn from(err: DataError) -> Self {
        LoadError::Storage(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_are_opaque() {
        let err = LoadError::from(DataError::connection(std::io::Error::other(
            "connection reset",
        )));
        assert!(!err.is_expected());
        assert_eq!(err.public_message(), "Internal error");
        assert!(err.to_string().contains("connection reset"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_denials_are_expected() {
        let err = LoadError::AccessDenied {
            key: Key::workout_session(1),
        };
        assert!(err.is_expected());
        assert_eq!(err.public_message(), "Access denied");
        assert_eq!(err.to_string(), "Access denied to workout_session:1");
    }

    #[test]
    fn test_from_key_parse_error() {
        let err: LoadError = Key::parse(EntityKind::Exercise, "x1").unwrap_err().into();
        assert!(matches!(
            err,
            LoadError::MalformedKey { kind: EntityKind::Exercise, ref raw } if raw == "x1"
        ));
        assert_eq!(err.public_message(), "Invalid exercise id");
    }
}

use crate::error::LoadError;
use ironlog_data::Key;

/// Result of loading one key.
///
/// Produced once per (request, key) and served from the request cache
/// afterwards, except for `Error`, which is delivered but never memoized.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Value(T),
    NotFound,
    Error(LoadError),
}

impl<T> Outcome<T> {
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Outcome::NotFound)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&LoadError> {
        match self {
            Outcome::Error(err) => Some(err),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Error(err) => Outcome::Error(err),
        }
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
        match self {
            Outcome::Value(v) => f(v),
            Outcome::NotFound => Outcome::NotFound,
            Outcome::Error(err) => Outcome::Error(err),
        }
    }

    /// Convert into a `Result`, turning `NotFound` into
    /// [`LoadError::NotFound`] for `key`.
    pub fn into_result(self, key: Key) -> Result<T, LoadError> {
        match self {
            Outcome::Value(v) => Ok(v),
            Outcome::NotFound => Err(LoadError::NotFound { key }),
            Outcome::Error(err) => Err(err),
        }
    }

    /// Convert into `Result<Option<T>, _>`, the shape nullable graph fields
    /// resolve to.
    pub fn into_optional(self) -> Result<Option<T>, LoadError> {
        match self {
            Outcome::Value(v) => Ok(Some(v)),
            Outcome::NotFound => Ok(None),
            Outcome::Error(err) => Err(err),
        }
    }
}

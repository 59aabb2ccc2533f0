use ironlog_data::UserId;
use serde_json::Value;

/// The authenticated caller of one request.
///
/// A request without a principal is represented as `Option::<Principal>::None`
/// throughout the loader; that is the unauthenticated state, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Principal {
    user_id: UserId,
    subject: String,
    claims: Value,
}

impl Principal {
    /// Principal with no issuance claims attached.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            subject: user_id.to_string(),
            claims: Value::Null,
        }
    }

    /// Build a principal from already-validated JWT claims.
    ///
    /// The `sub` claim must carry the numeric user id, either as a string
    /// or a number. Returns `None` when it does not, which the caller
    /// treats as an unauthenticated request.
    ///
    /// # Examples
    ///
    /// ```
    /// use ironlog_loader::Principal;
    /// use ironlog_data::UserId;
    ///
    /// let p = Principal::from_claims(serde_json::json!({"sub": "42", "iat": 1700000000})).unwrap();
    /// assert_eq!(p.user_id(), UserId(42));
    /// assert_eq!(p.issued_at(), Some(1700000000));
    /// assert!(Principal::from_claims(serde_json::json!({"sub": "alice"})).is_none());
    /// ```
    pub fn from_claims(claims: Value) -> Option<Self> {
        let (subject, id) = match claims.get("sub")? {
            Value::String(s) => (s.clone(), s.parse::<i64>().ok()?),
            Value::Number(n) => (n.to_string(), n.as_i64()?),
            _ => return None,
        };
        if id <= 0 {
            return None;
        }
        Some(Self {
            user_id: UserId(id),
            subject,
            claims,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Raw issuance claims (`Value::Null` when built with [`Principal::new`]).
    pub fn claims(&self) -> &Value {
        &self.claims
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// `iat` claim, in unix seconds.
    pub fn issued_at(&self) -> Option<i64> {
        self.claim("iat").and_then(Value::as_i64)
    }

    /// `exp` claim, in unix seconds.
    pub fn expires_at(&self) -> Option<i64> {
        self.claim("exp").and_then(Value::as_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_claims_numeric_sub() {
        let p = Principal::from_claims(json!({"sub": 7, "exp": 99})).unwrap();
        assert_eq!(p.user_id(), UserId(7));
        assert_eq!(p.subject(), "7");
        assert_eq!(p.expires_at(), Some(99));
    }

    #[test]
    fn test_from_claims_rejects_missing_or_invalid_sub() {
        assert!(Principal::from_claims(json!({})).is_none());
        assert!(Principal::from_claims(json!({"sub": "0"})).is_none());
        assert!(Principal::from_claims(json!({"sub": true})).is_none());
    }

    #[test]
    fn test_new_has_no_claims() {
        let p = Principal::new(UserId(3));
        assert_eq!(p.claims(), &Value::Null);
        assert_eq!(p.issued_at(), None);
    }
}

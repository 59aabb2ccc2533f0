//! Ownership-based authorization gate.

use crate::error::LoadError;
use crate::executor::LinkFetch;
use crate::loader::Loader;
use crate::outcome::Outcome;
use crate::principal::Principal;
use ironlog_data::{EntityKind, Key, OwnerLink};
use std::fmt;
use tracing::{debug, trace, warn};

/// Why access was refused.
///
/// All reasons surface to callers as a denial; they stay distinct so logs
/// can tell a missing record from a foreign one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No principal on the request.
    Unauthenticated,
    /// The chain resolved to a different user.
    NotOwner,
    /// The requested record does not exist.
    NotFound,
    /// A record above the requested one is missing or points somewhere
    /// the static ownership path does not allow.
    BrokenChain,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::Unauthenticated => write!(f, "unauthenticated"),
            DenyReason::NotOwner => write!(f, "access denied"),
            DenyReason::NotFound => write!(f, "not found"),
            DenyReason::BrokenChain => write!(f, "broken ownership chain"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(DenyReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Authorization gate bound to one request's principal.
///
/// Walks from the requested key to the record that names its owner, one
/// [`OwnerLink`] at a time, and compares that owner with the principal.
/// Links are read through the request's link loader, so they are batched
/// with sibling checks and memoized for the rest of the request. The
/// decision itself is never cached: every call walks the (cached) links
/// again.
///
/// The walk fails closed. A missing intermediate record, a link to a kind
/// outside the static path, or a chain longer than
/// [`EntityKind::MAX_OWNER_HOPS`] all deny.
#[derive(Clone)]
pub struct AuthorizationGate {
    principal: Option<Principal>,
    links: Loader<LinkFetch>,
}

impl AuthorizationGate {
    pub fn new(principal: Option<Principal>, links: Loader<LinkFetch>) -> Self {
        Self { principal, links }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// Decide whether the bound principal may read `key`.
    ///
    /// Storage failures while reading links are returned as errors rather
    /// than folded into a denial.
    pub async fn check(&self, key: Key) -> Result<AccessDecision, LoadError> {
        let Some(principal) = &self.principal else {
            trace!(key = %key, "denied: unauthenticated");
            return Ok(AccessDecision::Deny(DenyReason::Unauthenticated));
        };

        let mut current = key;
        for hop in 0..=EntityKind::MAX_OWNER_HOPS {
            let expected_parent = current.kind().owner_parent();
            match self.links.load(current).await {
                Outcome::Value(OwnerLink::Owner(owner)) if expected_parent.is_none() => {
                    let decision = if owner == principal.user_id() {
                        AccessDecision::Allow
                    } else {
                        debug!(key = %key, user = %principal.user_id(), "denied: not owner");
                        AccessDecision::Deny(DenyReason::NotOwner)
                    };
                    trace!(key = %key, hops = hop, decision = ?decision, "authorization check");
                    return Ok(decision);
                }
                Outcome::Value(OwnerLink::Parent(parent))
                    if Some(parent.kind()) == expected_parent =>
                {
                    current = parent;
                }
                Outcome::Value(link) => {
                    warn!(key = %key, at = %current, link = ?link, "denied: unexpected ownership link");
                    return Ok(AccessDecision::Deny(DenyReason::BrokenChain));
                }
                Outcome::NotFound if hop == 0 => {
                    debug!(key = %key, "denied: not found");
                    return Ok(AccessDecision::Deny(DenyReason::NotFound));
                }
                Outcome::NotFound => {
                    warn!(key = %key, missing = %current, "denied: broken ownership chain");
                    return Ok(AccessDecision::Deny(DenyReason::BrokenChain));
                }
                Outcome::Error(err) => return Err(err),
            }
        }

        warn!(key = %key, "denied: ownership chain too long");
        Ok(AccessDecision::Deny(DenyReason::BrokenChain))
    }
}

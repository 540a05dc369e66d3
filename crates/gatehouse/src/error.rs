//! Denial and access error types.
//!
//! A [`Denial`] is the policy outcome "access not granted". Anything else an
//! evaluation can fail with is an infrastructure problem (the identity could
//! not be read) and stays a separate [`AccessError`] variant, so hosts can
//! reject-and-log denials but retry or alert on the rest.

use std::error::Error as StdError;

use thiserror::Error;

use crate::identity::{IdentityError, Lookup};

/// Boxed error used for causes and host-supplied failures.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Reason used when a denial is created without one.
pub const DEFAULT_DENIAL_REASON: &str = "access denied";

// ============================================================================
// Denial
// ============================================================================

/// Access was not granted by policy.
///
/// Carries a human-readable reason (never empty) and optionally the error that
/// led to the decision. The cause is exposed through [`StdError::source`], so
/// the whole chain can be walked with [`Denial::chain`].
#[derive(Debug, Error)]
#[error("access error: {reason}{}", render_cause(.cause))]
pub struct Denial {
    reason: String,
    #[source]
    cause: Option<BoxError>,
}

impl Denial {
    /// Creates a denial with the given reason.
    ///
    /// An empty reason is replaced with [`DEFAULT_DENIAL_REASON`].
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: non_empty(reason.into()),
            cause: None,
        }
    }

    /// Creates a denial that keeps `cause` as its source.
    pub fn wrap(reason: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        Self {
            reason: non_empty(reason.into()),
            cause: Some(cause.into()),
        }
    }

    /// The policy reason, without the `access error:` prefix or the cause.
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// The wrapped cause, if any.
    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Iterates over this denial followed by every error in its source chain.
    pub fn chain(&self) -> impl Iterator<Item = &(dyn StdError + 'static)> {
        std::iter::successors(Some(self as &(dyn StdError + 'static)), |&err| err.source())
    }

    /// The last error in the source chain, or the denial itself.
    pub fn root_cause(&self) -> &(dyn StdError + 'static) {
        let mut current: &(dyn StdError + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current
    }
}

fn non_empty(reason: String) -> String {
    if reason.is_empty() {
        DEFAULT_DENIAL_REASON.to_string()
    } else {
        reason
    }
}

fn render_cause(cause: &Option<BoxError>) -> String {
    match cause {
        Some(cause) => format!(": {cause}"),
        None => String::new(),
    }
}

// ============================================================================
// AccessError
// ============================================================================

/// Error returned by rule evaluation.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Access denied by policy.
    #[error(transparent)]
    Denied(#[from] Denial),

    /// The identity context failed to produce a value.
    #[error("failed to get {lookup}: {source}")]
    Identity {
        lookup: Lookup,
        #[source]
        source: IdentityError,
    },

    /// A required attribute is absent from the identity altogether.
    #[error("{attribute} attribute not found in identity")]
    AttributeNotFound { attribute: String },

    /// A custom rule failed for a reason of its own.
    #[error("{0}")]
    Other(#[source] BoxError),
}

impl AccessError {
    pub(crate) fn identity(lookup: Lookup, source: IdentityError) -> Self {
        Self::Identity { lookup, source }
    }

    /// Wraps an arbitrary error raised by a custom rule.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// Returns `true` if this is a policy denial rather than an
    /// infrastructure failure.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    /// Returns the denial, if this is one.
    pub fn as_denial(&self) -> Option<&Denial> {
        match self {
            Self::Denied(denial) => Some(denial),
            _ => None,
        }
    }

    /// The denial reason for denials, the rendered error otherwise.
    pub fn reason(&self) -> String {
        match self {
            Self::Denied(denial) => denial.reason().to_string(),
            other => other.to_string(),
        }
    }
}

/// Finds a [`Denial`] anywhere in an error's source chain.
///
/// Looks through [`AccessError`] wrappers as well, since `AccessError::Denied`
/// forwards `source()` past the denial it holds.
pub fn find_denial<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a Denial> {
    std::iter::successors(Some(err), |&err| err.source()).find_map(|err| {
        err.downcast_ref::<Denial>()
            .or_else(|| err.downcast_ref::<AccessError>().and_then(AccessError::as_denial))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("ledger unreachable")]
    struct LedgerDown;

    #[derive(Debug, Error)]
    #[error("lookup failed")]
    struct LookupFailed(#[source] LedgerDown);

    #[test]
    fn test_denial_display_without_cause() {
        let denial = Denial::new("required role 'admin', got 'user'");
        assert_eq!(
            denial.to_string(),
            "access error: required role 'admin', got 'user'"
        );
        assert!(denial.cause().is_none());
    }

    #[test]
    fn test_denial_display_with_cause() {
        let denial = Denial::wrap("admin type required", LedgerDown);
        assert_eq!(
            denial.to_string(),
            "access error: admin type required: ledger unreachable"
        );
        assert_eq!(denial.reason(), "admin type required");
    }

    #[test]
    fn test_empty_reason_is_replaced() {
        assert_eq!(Denial::new("").reason(), DEFAULT_DENIAL_REASON);
        assert_eq!(Denial::wrap("", LedgerDown).reason(), DEFAULT_DENIAL_REASON);
    }

    #[test]
    fn test_chain_reaches_root_cause() {
        let denial = Denial::wrap("outer", LookupFailed(LedgerDown));

        let rendered: Vec<String> = denial.chain().map(ToString::to_string).collect();
        assert_eq!(rendered.len(), 3);
        assert_eq!(rendered[1], "lookup failed");
        assert_eq!(denial.root_cause().to_string(), "ledger unreachable");
        assert!(denial.root_cause().downcast_ref::<LedgerDown>().is_some());
    }

    #[test]
    fn test_chain_walks_into_identity_errors() {
        let denial = Denial::wrap(
            "AND rule failed",
            AccessError::identity(
                Lookup::Certificate,
                IdentityError::Unavailable("stub closed".to_string()),
            ),
        );

        assert_eq!(denial.chain().count(), 3);
        assert!(denial.root_cause().downcast_ref::<IdentityError>().is_some());
        assert_eq!(find_denial(&denial).map(Denial::reason), Some("AND rule failed"));
    }

    #[test]
    fn test_root_cause_of_plain_denial_is_itself() {
        let denial = Denial::new("nope");
        assert!(denial.root_cause().downcast_ref::<Denial>().is_some());
    }

    #[test]
    fn test_access_error_classification() {
        let denied = AccessError::from(Denial::new("nope"));
        assert!(denied.is_denial());
        assert_eq!(denied.reason(), "nope");
        assert_eq!(denied.to_string(), "access error: nope");

        let missing = AccessError::AttributeNotFound {
            attribute: "role".to_string(),
        };
        assert!(!missing.is_denial());
        assert!(missing.as_denial().is_none());
        assert_eq!(missing.reason(), "role attribute not found in identity");

        let other = AccessError::other(LedgerDown);
        assert!(!other.is_denial());
        assert_eq!(other.to_string(), "ledger unreachable");
    }

    #[test]
    fn test_identity_error_display() {
        let err = AccessError::identity(
            Lookup::OrganizationId,
            IdentityError::Unavailable("stub closed".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "failed to get organization ID: identity unavailable: stub closed"
        );
    }

    #[test]
    fn test_find_denial_through_wrappers() {
        let err = AccessError::from(Denial::new("nope"));
        let found = find_denial(&err).map(Denial::reason);
        assert_eq!(found, Some("nope"));

        let nested = Denial::wrap("outer", AccessError::from(Denial::new("inner")));
        assert_eq!(find_denial(&nested).map(Denial::reason), Some("outer"));

        let infra = AccessError::other(LedgerDown);
        assert!(find_denial(&infra).is_none());
    }
}

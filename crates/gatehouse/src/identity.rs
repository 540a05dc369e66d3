//! The caller identity seen by rules.
//!
//! The host supplies an [`IdentityContext`] per evaluation. It is read-only and
//! already authenticated upstream; rules only ever read from it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AccessError, BoxError};

/// Attribute holding the caller's application role.
pub const ROLE_ATTRIBUTE: &str = "role";

/// Attribute holding the platform identity type (`admin`, `client`, `peer`, ...).
pub const PLATFORM_TYPE_ATTRIBUTE: &str = "hf.Type";

// ============================================================================
// Errors
// ============================================================================

/// Failure raised by an identity context while reading caller data.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The identity could not be read at all.
    #[error("identity unavailable: {0}")]
    Unavailable(String),

    /// The caller's certificate could not be decoded.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// An asserted attribute is missing.
    #[error("attribute {name} not found")]
    AttributeNotFound { name: String },

    /// An asserted attribute holds a different value.
    #[error("attribute {name} equals {actual}, not {expected}")]
    AttributeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    /// Host-specific failure.
    #[error("{0}")]
    Other(#[from] BoxError),
}

/// Which identity read failed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lookup {
    Id,
    OrganizationId,
    Attribute(String),
    Certificate,
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id => f.write_str("ID"),
            Self::OrganizationId => f.write_str("organization ID"),
            Self::Attribute(name) => write!(f, "attribute '{name}'"),
            Self::Certificate => f.write_str("certificate"),
        }
    }
}

// ============================================================================
// IdentityContext
// ============================================================================

/// Subject data taken from the caller's certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Organizational units listed in the certificate subject.
    pub organizational_units: Vec<String>,
}

/// Read-only view of the authenticated caller.
///
/// Implementations must be side-effect free; rules may read the same value
/// several times within one evaluation.
pub trait IdentityContext {
    /// Unique identifier of the caller within its organization.
    fn id(&self) -> Result<String, IdentityError>;

    /// Identifier of the organization that issued the caller's identity.
    fn organization_id(&self) -> Result<String, IdentityError>;

    /// Looks up a named attribute. `Ok(None)` means the attribute is absent.
    fn attribute(&self, name: &str) -> Result<Option<String>, IdentityError>;

    /// Fails unless attribute `name` is present and equal to `expected`.
    fn assert_attribute(&self, name: &str, expected: &str) -> Result<(), IdentityError> {
        match self.attribute(name)? {
            Some(actual) if actual == expected => Ok(()),
            Some(actual) => Err(IdentityError::AttributeMismatch {
                name: name.to_string(),
                expected: expected.to_string(),
                actual,
            }),
            None => Err(IdentityError::AttributeNotFound {
                name: name.to_string(),
            }),
        }
    }

    /// Parsed certificate of the caller.
    fn certificate(&self) -> Result<Certificate, IdentityError>;
}

// ============================================================================
// StaticIdentity
// ============================================================================

/// In-memory identity context.
///
/// Useful wherever the identity is already known up front, and as a test
/// double: [`fail_on`](Self::fail_on) makes a given read fail. A failing
/// certificate read returns [`IdentityError::InvalidCertificate`], every other
/// read [`IdentityError::Unavailable`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticIdentity {
    id: String,
    organization_id: String,
    attributes: BTreeMap<String, String>,
    certificate: Certificate,
    failing: BTreeSet<Lookup>,
}

impl StaticIdentity {
    /// Creates an identity issued by `organization_id` with no attributes.
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            ..Self::default()
        }
    }

    /// Sets the caller id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the `role` attribute.
    pub fn with_role(self, role: impl Into<String>) -> Self {
        self.with_attribute(ROLE_ATTRIBUTE, role)
    }

    /// Sets an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Adds an organizational unit to the certificate.
    pub fn with_organizational_unit(mut self, unit: impl Into<String>) -> Self {
        self.certificate.organizational_units.push(unit.into());
        self
    }

    /// Makes the given read fail.
    pub fn fail_on(mut self, lookup: Lookup) -> Self {
        self.failing.insert(lookup);
        self
    }

    fn guard(&self, lookup: &Lookup) -> Result<(), IdentityError> {
        if !self.failing.contains(lookup) {
            return Ok(());
        }
        Err(match lookup {
            Lookup::Certificate => {
                IdentityError::InvalidCertificate("certificate could not be decoded".to_string())
            }
            other => IdentityError::Unavailable(format!("{other} lookup failed")),
        })
    }
}

impl IdentityContext for StaticIdentity {
    fn id(&self) -> Result<String, IdentityError> {
        self.guard(&Lookup::Id)?;
        Ok(self.id.clone())
    }

    fn organization_id(&self) -> Result<String, IdentityError> {
        self.guard(&Lookup::OrganizationId)?;
        Ok(self.organization_id.clone())
    }

    fn attribute(&self, name: &str) -> Result<Option<String>, IdentityError> {
        self.guard(&Lookup::Attribute(name.to_string()))?;
        Ok(self.attributes.get(name).cloned())
    }

    fn certificate(&self) -> Result<Certificate, IdentityError> {
        self.guard(&Lookup::Certificate)?;
        Ok(self.certificate.clone())
    }
}

// ============================================================================
// Caller helpers
// ============================================================================

/// Summary of the caller, used for denial reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    pub organization_id: String,
    pub id: String,
    /// The `role` attribute, if the identity carries one.
    pub role: Option<String>,
    pub organizational_units: Vec<String>,
}

impl CallerInfo {
    /// Reads every field from the identity context.
    pub fn collect(ctx: &dyn IdentityContext) -> Result<Self, AccessError> {
        let id = ctx
            .id()
            .map_err(|source| AccessError::identity(Lookup::Id, source))?;
        let role = ctx.attribute(ROLE_ATTRIBUTE).map_err(|source| {
            AccessError::identity(Lookup::Attribute(ROLE_ATTRIBUTE.to_string()), source)
        })?;
        let organization_id = ctx
            .organization_id()
            .map_err(|source| AccessError::identity(Lookup::OrganizationId, source))?;
        let certificate = ctx
            .certificate()
            .map_err(|source| AccessError::identity(Lookup::Certificate, source))?;

        Ok(Self {
            organization_id,
            id,
            role,
            organizational_units: certificate.organizational_units,
        })
    }
}

/// Returns whether the caller carries attribute `name`, whatever its value.
pub fn has_attribute(ctx: &dyn IdentityContext, name: &str) -> Result<bool, AccessError> {
    ctx.attribute(name)
        .map(|value| value.is_some())
        .map_err(|source| AccessError::identity(Lookup::Attribute(name.to_string()), source))
}

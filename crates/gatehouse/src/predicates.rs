//! Identity predicate evaluation.
//!
//! Each predicate reads what it needs from the identity context first. A
//! failed read is returned as an infrastructure error, untouched; only a
//! successful read that does not satisfy the rule becomes a [`Denial`].
//!
//! Denial messages name the requirement and the observed value, never other
//! configured policy.

use crate::error::{AccessError, Denial};
use crate::identity::{IdentityContext, Lookup, PLATFORM_TYPE_ATTRIBUTE, ROLE_ATTRIBUTE};

// ============================================================================
// Reads
// ============================================================================

fn organization_id(ctx: &dyn IdentityContext) -> Result<String, AccessError> {
    ctx.organization_id()
        .map_err(|source| AccessError::identity(Lookup::OrganizationId, source))
}

fn organizational_units(ctx: &dyn IdentityContext) -> Result<Vec<String>, AccessError> {
    ctx.certificate()
        .map(|certificate| certificate.organizational_units)
        .map_err(|source| AccessError::identity(Lookup::Certificate, source))
}

fn attribute(ctx: &dyn IdentityContext, name: &str) -> Result<Option<String>, AccessError> {
    ctx.attribute(name)
        .map_err(|source| AccessError::identity(Lookup::Attribute(name.to_string()), source))
}

/// The role must be present; absence is not a policy outcome.
fn role(ctx: &dyn IdentityContext) -> Result<String, AccessError> {
    attribute(ctx, ROLE_ATTRIBUTE)?.ok_or_else(|| AccessError::AttributeNotFound {
        attribute: ROLE_ATTRIBUTE.to_string(),
    })
}

fn denied(reason: String) -> AccessError {
    Denial::new(reason).into()
}

// ============================================================================
// Organization
// ============================================================================

pub(crate) fn organization_equals(
    ctx: &dyn IdentityContext,
    expected: &str,
) -> Result<(), AccessError> {
    let actual = organization_id(ctx)?;
    if actual != expected {
        return Err(denied(format!(
            "required organization '{expected}', got '{actual}'"
        )));
    }
    Ok(())
}

pub(crate) fn organization_in(
    ctx: &dyn IdentityContext,
    expected: &[String],
) -> Result<(), AccessError> {
    let actual = organization_id(ctx)?;
    if expected.contains(&actual) {
        return Ok(());
    }
    Err(denied(format!(
        "required one of organizations {expected:?}, got '{actual}'"
    )))
}

// ============================================================================
// Organizational unit
// ============================================================================

pub(crate) fn org_unit_equals(
    ctx: &dyn IdentityContext,
    expected: &str,
) -> Result<(), AccessError> {
    let organization = organization_id(ctx)?;
    let units = organizational_units(ctx)?;

    if units.iter().any(|unit| unit == expected) {
        return Ok(());
    }
    Err(denied(format!(
        "required organizational unit '{expected}', organization: {organization}"
    )))
}

pub(crate) fn org_unit_in(
    ctx: &dyn IdentityContext,
    expected: &[String],
) -> Result<(), AccessError> {
    let organization = organization_id(ctx)?;
    let units = organizational_units(ctx)?;

    if units.iter().any(|unit| expected.contains(unit)) {
        return Ok(());
    }
    Err(denied(format!(
        "required one of organizational units {expected:?}, organization: {organization}"
    )))
}

// ============================================================================
// Role
// ============================================================================

pub(crate) fn role_equals(ctx: &dyn IdentityContext, expected: &str) -> Result<(), AccessError> {
    let actual = role(ctx)?;
    if actual != expected {
        return Err(denied(format!("required role '{expected}', got '{actual}'")));
    }
    Ok(())
}

pub(crate) fn role_in(ctx: &dyn IdentityContext, expected: &[String]) -> Result<(), AccessError> {
    let actual = role(ctx)?;
    if expected.contains(&actual) {
        return Ok(());
    }
    Err(denied(format!(
        "required one of roles {expected:?}, got '{actual}'"
    )))
}

// ============================================================================
// Attributes
// ============================================================================

/// An empty `expected` value only checks that the attribute is present.
pub(crate) fn attribute_equals(
    ctx: &dyn IdentityContext,
    name: &str,
    expected: &str,
) -> Result<(), AccessError> {
    let Some(actual) = attribute(ctx, name)? else {
        return Err(denied(format!("attribute '{name}' not found")));
    };

    if !expected.is_empty() && actual != expected {
        return Err(denied(format!(
            "attribute '{name}' has value '{actual}', expected '{expected}'"
        )));
    }
    Ok(())
}

pub(crate) fn attribute_present(ctx: &dyn IdentityContext, name: &str) -> Result<(), AccessError> {
    if attribute(ctx, name)?.is_none() {
        return Err(denied(format!("attribute '{name}' not found")));
    }
    Ok(())
}

// ============================================================================
// Platform identity type
// ============================================================================

/// The assertion failure is the policy outcome here, so it is wrapped as the
/// denial's cause rather than propagated.
pub(crate) fn platform_type(ctx: &dyn IdentityContext, expected: &str) -> Result<(), AccessError> {
    ctx.assert_attribute(PLATFORM_TYPE_ATTRIBUTE, expected)
        .map_err(|cause| {
            Denial::wrap(
                format!("{expected} type required in {PLATFORM_TYPE_ATTRIBUTE} attribute"),
                cause,
            )
            .into()
        })
}

//! Rule definitions.
//!
//! A [`Rule`] is an immutable check against the caller's identity. Atomic
//! predicates compare identity data to configured values; `And`, `Or` and
//! `Not` compose any rules, including other combinators, into a tree.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::combinators;
use crate::error::{AccessError, Denial};
use crate::identity::IdentityContext;
use crate::predicates;

/// Signature of a custom rule predicate.
pub type CheckFn = dyn Fn(&dyn IdentityContext) -> Result<(), AccessError> + Send + Sync;

// ============================================================================
// Rule
// ============================================================================

/// An access rule.
///
/// Rules are built once, bottom-up, and never mutated, so a tree can be shared
/// by any number of concurrent evaluations. Every variant except `Custom` can
/// be declared in a configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    // -- Organization --
    /// Caller's organization id must equal the value.
    OrganizationEquals(String),
    /// Caller's organization id must be one of the values.
    OrganizationIn(Vec<String>),

    // -- Organizational unit --
    /// Caller's certificate must list the unit.
    OrgUnitEquals(String),
    /// Caller's certificate must list at least one of the units.
    OrgUnitIn(Vec<String>),

    // -- Role --
    /// The `role` attribute must equal the value.
    RoleEquals(String),
    /// The `role` attribute must be one of the values.
    RoleIn(Vec<String>),

    // -- Attributes --
    /// Attribute `name` must be present and, unless `value` is empty, equal it.
    Attribute {
        name: String,
        #[serde(default)]
        value: String,
    },
    /// Attribute must be present with any value.
    HasAttribute(String),

    // -- Platform identity type --
    /// Caller must be a platform administrator.
    PlatformAdmin,
    /// Caller must be a platform client.
    PlatformClient,

    // -- Escape hatches --
    /// Caller-supplied predicate.
    #[serde(skip)]
    Custom(CustomRule),
    /// Always denies with the message (or a generic one when empty).
    AlwaysDeny(String),

    // -- Logical combinators --
    /// Every child must pass. All children are evaluated.
    And(Vec<Rule>),
    /// At least one child must pass. Stops at the first success.
    Or(Vec<Rule>),
    /// The child must fail.
    Not(Box<Rule>),
}

impl Rule {
    pub fn organization(id: impl Into<String>) -> Self {
        Self::OrganizationEquals(id.into())
    }

    pub fn any_organization<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OrganizationIn(ids.into_iter().map(Into::into).collect())
    }

    pub fn org_unit(unit: impl Into<String>) -> Self {
        Self::OrgUnitEquals(unit.into())
    }

    pub fn any_org_unit<I, S>(units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OrgUnitIn(units.into_iter().map(Into::into).collect())
    }

    pub fn role(role: impl Into<String>) -> Self {
        Self::RoleEquals(role.into())
    }

    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::RoleIn(roles.into_iter().map(Into::into).collect())
    }

    /// Requires attribute `name`; an empty `value` only checks presence.
    pub fn attribute(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Attribute {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn has_attribute(name: impl Into<String>) -> Self {
        Self::HasAttribute(name.into())
    }

    pub fn platform_admin() -> Self {
        Self::PlatformAdmin
    }

    pub fn platform_client() -> Self {
        Self::PlatformClient
    }

    /// Wraps a predicate so it can take part in combinators.
    pub fn custom<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&dyn IdentityContext) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        Self::Custom(CustomRule::new(name, check))
    }

    pub fn always_deny(message: impl Into<String>) -> Self {
        Self::AlwaysDeny(message.into())
    }

    pub fn and(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::And(rules.into_iter().collect())
    }

    pub fn or(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self::Or(rules.into_iter().collect())
    }

    pub fn not(rule: Rule) -> Self {
        Self::Not(Box::new(rule))
    }

    /// Evaluates the rule against the caller.
    ///
    /// Returns `Err(AccessError::Denied(_))` when policy refuses access and
    /// another variant when the identity itself could not be read.
    pub fn check(&self, ctx: &dyn IdentityContext) -> Result<(), AccessError> {
        match self {
            Self::OrganizationEquals(expected) => predicates::organization_equals(ctx, expected),
            Self::OrganizationIn(expected) => predicates::organization_in(ctx, expected),
            Self::OrgUnitEquals(expected) => predicates::org_unit_equals(ctx, expected),
            Self::OrgUnitIn(expected) => predicates::org_unit_in(ctx, expected),
            Self::RoleEquals(expected) => predicates::role_equals(ctx, expected),
            Self::RoleIn(expected) => predicates::role_in(ctx, expected),
            Self::Attribute { name, value } => predicates::attribute_equals(ctx, name, value),
            Self::HasAttribute(name) => predicates::attribute_present(ctx, name),
            Self::PlatformAdmin => predicates::platform_type(ctx, "admin"),
            Self::PlatformClient => predicates::platform_type(ctx, "client"),
            Self::Custom(custom) => custom.check(ctx),
            Self::AlwaysDeny(message) => Err(Denial::new(message.as_str()).into()),
            Self::And(rules) => combinators::all(rules, ctx),
            Self::Or(rules) => combinators::any(rules, ctx),
            Self::Not(rule) => combinators::not(rule, ctx),
        }
    }

    /// Short name of the rule kind, used in logs.
    pub fn kind(&self) -> &str {
        match self {
            Self::OrganizationEquals(_) => "organization_equals",
            Self::OrganizationIn(_) => "organization_in",
            Self::OrgUnitEquals(_) => "org_unit_equals",
            Self::OrgUnitIn(_) => "org_unit_in",
            Self::RoleEquals(_) => "role_equals",
            Self::RoleIn(_) => "role_in",
            Self::Attribute { .. } => "attribute",
            Self::HasAttribute(_) => "has_attribute",
            Self::PlatformAdmin => "platform_admin",
            Self::PlatformClient => "platform_client",
            Self::Custom(custom) => custom.name(),
            Self::AlwaysDeny(_) => "always_deny",
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::Not(_) => "not",
        }
    }
}

// ============================================================================
// CustomRule
// ============================================================================

/// A named caller-supplied predicate.
#[derive(Clone)]
pub struct CustomRule {
    name: String,
    check: Arc<CheckFn>,
}

impl CustomRule {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&dyn IdentityContext) -> Result<(), AccessError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, ctx: &dyn IdentityContext) -> Result<(), AccessError> {
        (self.check)(ctx)
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

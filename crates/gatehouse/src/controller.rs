//! Top-level access checks.
//!
//! An [`AccessController`] holds the rules guarding an operation and checks
//! them in order, stopping at the first failure. Unlike the `And` combinator
//! it does not collect every failure.

use tracing::{debug, warn};

use crate::error::AccessError;
use crate::identity::IdentityContext;
use crate::rule::Rule;

/// Ordered list of rules evaluated as an implicit AND with early exit.
///
/// The controller is immutable configuration: build it once and share it
/// between callers.
#[derive(Debug, Clone)]
pub struct AccessController {
    rules: Vec<Rule>,

    /// Whether to log access decisions.
    audit_enabled: bool,
}

impl AccessController {
    /// Creates a controller over `rules`. An empty list allows everyone.
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
            audit_enabled: true,
        }
    }

    /// Disables decision logging.
    pub fn without_audit(mut self) -> Self {
        self.audit_enabled = false;
        self
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Checks every rule in order and returns the first failure.
    ///
    /// **Audit:** logs granted checks at `debug` and refused ones at `warn`.
    pub fn check(&self, ctx: &dyn IdentityContext) -> Result<(), AccessError> {
        evaluate(&self.rules, ctx, self.audit_enabled)
    }
}

impl Default for AccessController {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FromIterator<Rule> for AccessController {
    fn from_iter<I: IntoIterator<Item = Rule>>(rules: I) -> Self {
        Self::new(rules)
    }
}

/// Checks `rules` once, with the same semantics as [`AccessController::check`].
pub fn check_access(ctx: &dyn IdentityContext, rules: &[Rule]) -> Result<(), AccessError> {
    evaluate(rules, ctx, true)
}

/// Builds a reusable guard from `rules`, for hosts that take a plain
/// function in front of their handlers.
pub fn middleware(
    rules: impl IntoIterator<Item = Rule>,
) -> impl Fn(&dyn IdentityContext) -> Result<(), AccessError> + Send + Sync + Clone {
    let controller = AccessController::new(rules);
    move |ctx| controller.check(ctx)
}

fn evaluate(rules: &[Rule], ctx: &dyn IdentityContext, audit: bool) -> Result<(), AccessError> {
    for (index, rule) in rules.iter().enumerate() {
        if let Err(err) = rule.check(ctx) {
            if audit {
                warn!(
                    rule = index + 1,
                    kind = rule.kind(),
                    denied = err.is_denial(),
                    error = %err,
                    "Access refused"
                );
            }
            return Err(err);
        }
    }

    if audit {
        debug!(rules = rules.len(), "Access granted");
    }
    Ok(())
}

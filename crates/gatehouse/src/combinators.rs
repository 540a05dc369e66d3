//! And / Or / Not evaluation.
//!
//! These are not classical short-circuit operators:
//! - `And` evaluates every child so a failure reports every unmet condition.
//! - `Or` stops at the first passing child.
//! - `Not` passes on any child failure and never leaks the child's error.
//!
//! A failing `And`/`Or` always returns one denial listing every failed child.
//! If any child failed with an infrastructure error rather than a denial, the
//! first such error becomes the denial's cause, so it stays reachable through
//! `source()`.

use tracing::trace;

use crate::error::{AccessError, Denial};
use crate::identity::IdentityContext;
use crate::rule::Rule;

/// Reason used by an `Or` with no children.
pub const EMPTY_OR_REASON: &str = "OR rule: no rules defined";

/// Reason used when a `Not` child passes.
pub const NOT_REASON: &str = "NOT rule: rule should not pass";

/// A failed child: 1-based position and its error.
type Failure = (usize, AccessError);

pub(crate) fn all(rules: &[Rule], ctx: &dyn IdentityContext) -> Result<(), AccessError> {
    let failures: Vec<Failure> = rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| rule.check(ctx).err().map(|err| (index + 1, err)))
        .collect();

    if failures.is_empty() {
        return Ok(());
    }

    trace!(failed = failures.len(), total = rules.len(), "AND rule failed");
    Err(settle(failures, |listing| format!("AND rule failed: {listing}")))
}

pub(crate) fn any(rules: &[Rule], ctx: &dyn IdentityContext) -> Result<(), AccessError> {
    if rules.is_empty() {
        return Err(Denial::new(EMPTY_OR_REASON).into());
    }

    let mut failures = Vec::with_capacity(rules.len());
    for (index, rule) in rules.iter().enumerate() {
        match rule.check(ctx) {
            Ok(()) => {
                trace!(passed = index + 1, "OR rule satisfied");
                return Ok(());
            }
            Err(err) => failures.push((index + 1, err)),
        }
    }

    trace!(total = rules.len(), "OR rule failed");
    Err(settle(failures, |listing| {
        format!("OR rule failed: none of the rules passed: {listing}")
    }))
}

pub(crate) fn not(rule: &Rule, ctx: &dyn IdentityContext) -> Result<(), AccessError> {
    match rule.check(ctx) {
        Ok(()) => Err(Denial::new(NOT_REASON).into()),
        Err(_) => Ok(()),
    }
}

/// Turns collected failures into the combinator's denial.
fn settle(failures: Vec<Failure>, reason: impl FnOnce(String) -> String) -> AccessError {
    let reason = reason(describe(&failures));

    match failures.into_iter().find(|(_, err)| !err.is_denial()) {
        Some((_, infrastructure)) => Denial::wrap(reason, infrastructure).into(),
        None => Denial::new(reason).into(),
    }
}

/// `rule 1: <error>; rule 3: <error>`
fn describe(failures: &[Failure]) -> String {
    failures
        .iter()
        .map(|(position, err)| format!("rule {position}: {err}"))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::identity::{Lookup, StaticIdentity};

    fn ctx() -> StaticIdentity {
        StaticIdentity::new("Org1MSP")
            .with_role("admin")
            .with_organizational_unit("sales")
    }

    /// A rule that counts its invocations and passes or fails as told.
    fn counted(passes: bool, calls: &Arc<AtomicUsize>) -> Rule {
        let calls = Arc::clone(calls);
        Rule::custom("counted", move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            if passes {
                Ok(())
            } else {
                Err(Denial::new("counted rule failed").into())
            }
        })
    }

    #[test]
    fn test_and_empty_passes() {
        assert!(Rule::And(Vec::new()).check(&ctx()).is_ok());
    }

    #[test]
    fn test_or_empty_denies() {
        let err = Rule::Or(Vec::new()).check(&ctx()).unwrap_err();
        assert!(err.is_denial());
        assert_eq!(err.reason(), EMPTY_OR_REASON);
    }

    #[test]
    fn test_and_lists_only_failing_rules() {
        let rule = Rule::and([
            Rule::role("admin"),
            Rule::org_unit("manufacturing"),
            Rule::organization("Org1MSP"),
            Rule::always_deny("frozen"),
        ]);

        let err = rule.check(&ctx()).unwrap_err();
        assert_eq!(
            err.reason(),
            "AND rule failed: \
             rule 2: access error: required organizational unit 'manufacturing', organization: Org1MSP; \
             rule 4: access error: frozen"
        );
    }

    #[test]
    fn test_and_evaluates_every_child() {
        let calls = Arc::new(AtomicUsize::new(0));
        let rule = Rule::and([
            counted(false, &calls),
            counted(true, &calls),
            counted(false, &calls),
        ]);

        assert!(rule.check(&ctx()).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_or_stops_at_first_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let rule = Rule::or([
            counted(false, &calls),
            counted(true, &calls),
            counted(true, &calls),
        ]);

        assert!(rule.check(&ctx()).is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_or_aggregates_all_failures() {
        let rule = Rule::or([Rule::organization("Org2MSP"), Rule::role("auditor")]);

        let err = rule.check(&ctx()).unwrap_err();
        assert_eq!(
            err.reason(),
            "OR rule failed: none of the rules passed: \
             rule 1: access error: required organization 'Org2MSP', got 'Org1MSP'; \
             rule 2: access error: required role 'auditor', got 'admin'"
        );
    }

    #[test]
    fn test_not_inverts() {
        assert!(Rule::not(Rule::always_deny("x")).check(&ctx()).is_ok());

        let err = Rule::not(Rule::role("admin")).check(&ctx()).unwrap_err();
        assert!(err.is_denial());
        assert_eq!(err.reason(), NOT_REASON);
    }

    #[test]
    fn test_not_passes_on_infrastructure_failure() {
        let broken = ctx().fail_on(Lookup::OrganizationId);
        assert!(Rule::organization("Org1MSP").check(&broken).is_err());
        assert!(
            Rule::not(Rule::organization("Org1MSP"))
                .check(&broken)
                .is_ok()
        );
    }

    /// The first infrastructure error, found in the denial's cause.
    fn identity_cause(err: &AccessError) -> Option<&AccessError> {
        err.as_denial()?
            .cause()?
            .downcast_ref::<AccessError>()
    }

    #[test]
    fn test_and_lists_infrastructure_error_and_keeps_it_as_cause() {
        let calls = Arc::new(AtomicUsize::new(0));
        let broken = ctx().fail_on(Lookup::Certificate);
        let rule = Rule::and([
            Rule::role("auditor"),
            Rule::org_unit("sales"),
            counted(true, &calls),
        ]);

        let err = rule.check(&broken).unwrap_err();
        assert!(err.is_denial());
        assert_eq!(
            err.reason(),
            "AND rule failed: \
             rule 1: access error: required role 'auditor', got 'admin'; \
             rule 2: failed to get certificate: invalid certificate: certificate could not be decoded"
        );
        assert!(matches!(
            identity_cause(&err),
            Some(AccessError::Identity {
                lookup: Lookup::Certificate,
                ..
            })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_or_infrastructure_error_does_not_block_later_success() {
        let broken = ctx().fail_on(Lookup::Certificate);
        let rule = Rule::or([Rule::org_unit("sales"), Rule::role("admin")]);
        assert!(rule.check(&broken).is_ok());

        let rule = Rule::or([Rule::org_unit("sales"), Rule::role("auditor")]);
        let err = rule.check(&broken).unwrap_err();
        assert!(err.is_denial());
        assert_eq!(
            err.reason(),
            "OR rule failed: none of the rules passed: \
             rule 1: failed to get certificate: invalid certificate: certificate could not be decoded; \
             rule 2: access error: required role 'auditor', got 'admin'"
        );
        assert!(identity_cause(&err).is_some_and(|cause| !cause.is_denial()));
    }

    #[test]
    fn test_pure_denials_carry_no_cause() {
        let err = Rule::and([Rule::role("auditor")]).check(&ctx()).unwrap_err();
        assert!(err.as_denial().is_some_and(|denial| denial.cause().is_none()));
    }

    #[test]
    fn test_nested_trees() {
        // (Org2 AND admin) OR NOT(sales)
        let rule = Rule::or([
            Rule::and([Rule::organization("Org2MSP"), Rule::role("admin")]),
            Rule::not(Rule::org_unit("sales")),
        ]);
        let err = rule.check(&ctx()).unwrap_err();
        let reason = err.reason();
        assert!(reason.starts_with("OR rule failed: none of the rules passed: rule 1: access error: AND rule failed: rule 1:"));
        assert!(reason.ends_with(&format!("rule 2: access error: {NOT_REASON}")));

        let other = StaticIdentity::new("Org2MSP").with_role("admin");
        assert!(rule.check(&other).is_ok());
    }
}

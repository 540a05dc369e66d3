//! # gatehouse: identity-based access rules
//!
//! Declarative authorization for transactional code that already knows who
//! its caller is. Rules check the caller's organization, organizational
//! units, role and attributes, and compose with `And`, `Or` and `Not`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  IdentityContext (host)                      │
//! │  org id · id · attributes · certificate      │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  AccessController                            │
//! │  ├─ Rules checked in order, first failure    │
//! │  ├─ Combinators: And (all) / Or (first) / Not│
//! │  └─ Predicates read identity, never mutate   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Result<(), AccessError>                     │
//! │  - Denied: policy said no (with reason)      │
//! │  - Identity / AttributeNotFound: retryable   │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Semantics worth knowing
//!
//! - `And` evaluates every child and lists every failure; an empty `And` passes.
//! - `Or` stops at the first passing child; an empty `Or` always denies.
//! - `Not` passes whenever its child fails, for any reason.
//! - The controller itself stops at the first failing rule.
//!
//! ## Example
//!
//! ```
//! use gatehouse::{AccessController, Rule, StaticIdentity};
//!
//! let controller = AccessController::new([
//!     Rule::any_organization(["Org1MSP", "Org2MSP"]),
//!     Rule::or([Rule::role("admin"), Rule::org_unit("auditors")]),
//! ]);
//!
//! let caller = StaticIdentity::new("Org2MSP").with_role("admin");
//! assert!(controller.check(&caller).is_ok());
//!
//! let outsider = StaticIdentity::new("Org9MSP").with_role("admin");
//! let err = controller.check(&outsider).unwrap_err();
//! assert!(err.is_denial());
//! ```

pub mod audit;
pub mod combinators;
pub mod controller;
pub mod error;
pub mod identity;
mod predicates;
pub mod rule;


pub use audit::{ACCESS_DENIED_EVENT, DenialReporter, Notifier, log_access_denied};
pub use controller::{AccessController, check_access, middleware};
pub use error::{AccessError, BoxError, Denial, find_denial};
pub use identity::{
    CallerInfo, Certificate, IdentityContext, IdentityError, Lookup, StaticIdentity,
    has_attribute,
};
pub use rule::{CustomRule, Rule};

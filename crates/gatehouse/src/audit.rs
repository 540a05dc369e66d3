//! Denial reporting.
//!
//! After a refused check the host may publish an event describing who was
//! refused and why. Publishing is best-effort: a failing [`Notifier`] is
//! logged and otherwise ignored, never returned to the caller.

use std::error::Error as StdError;

use tracing::warn;

use crate::error::{BoxError, find_denial};
use crate::identity::{CallerInfo, IdentityContext};

/// Default event name for denial reports.
pub const ACCESS_DENIED_EVENT: &str = "AccessDenied";

/// Event sink provided by the host (e.g. the transaction's event channel).
pub trait Notifier {
    fn emit(&self, event_name: &str, payload: &[u8]) -> Result<(), BoxError>;
}

/// Publishes denial events under a fixed event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialReporter {
    event_name: String,
}

impl Default for DenialReporter {
    fn default() -> Self {
        Self::new(ACCESS_DENIED_EVENT)
    }
}

impl DenialReporter {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Emits an event describing `err` and the caller.
    ///
    /// The reason is the denial's own reason when `err` is (or wraps) a
    /// denial and the rendered error otherwise. If the caller cannot be
    /// described, the payload is just the error.
    pub fn report(
        &self,
        ctx: &dyn IdentityContext,
        notifier: &dyn Notifier,
        err: &(dyn StdError + 'static),
    ) {
        let payload = match CallerInfo::collect(ctx) {
            Ok(info) => {
                let reason = find_denial(err)
                    .map_or_else(|| err.to_string(), |denial| denial.reason().to_string());
                format!(
                    "Access denied for organization={}, id={}, role={}, reason: {reason}",
                    info.organization_id,
                    info.id,
                    info.role.as_deref().unwrap_or_default(),
                )
            }
            Err(_) => format!("Error: {err}"),
        };

        if let Err(emit_err) = notifier.emit(&self.event_name, payload.as_bytes()) {
            warn!(
                event = %self.event_name,
                error = %emit_err,
                "Failed to emit access denied event"
            );
        }
    }
}

/// Reports `err` under [`ACCESS_DENIED_EVENT`].
pub fn log_access_denied(
    ctx: &dyn IdentityContext,
    notifier: &dyn Notifier,
    err: &(dyn StdError + 'static),
) {
    DenialReporter::default().report(ctx, notifier, err);
}

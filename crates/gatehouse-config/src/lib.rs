//! Declarative policy configuration for gatehouse
//!
//! A policy file lists the top-level rules guarding an operation plus audit
//! settings. Sources are merged in order of precedence:
//! 1. Environment variables (GATEHOUSE_* prefix, `__` between sections)
//! 2. gatehouse.local.toml (gitignored, local overrides)
//! 3. gatehouse.toml (git-tracked, project policy)
//! 4. ~/.config/gatehouse/policy.toml (user defaults)
//! 5. Built-in defaults (no rules, audit on)
//!
//! ```toml
//! [audit]
//! event_name = "AccessDenied"
//!
//! [[rules]]
//! organization_in = ["Org1MSP", "Org2MSP"]
//!
//! [[rules]]
//! or = [{ role_equals = "admin" }, { org_unit_equals = "auditors" }]
//! ```

use gatehouse::{ACCESS_DENIED_EVENT, AccessController, DenialReporter, Rule};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// A complete policy: audit settings and the rules checked in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub audit: AuditConfig,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AuditConfig {
    /// Log access decisions through `tracing`.
    pub enabled: bool,
    /// Event name used when reporting denials.
    pub event_name: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            event_name: ACCESS_DENIED_EVENT.to_string(),
        }
    }
}

impl PolicyConfig {
    /// Parses a policy document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Reads and parses a single policy file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Rejects rules that can never describe a real identity.
    ///
    /// An `or` with no children is allowed (it always denies) but logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.audit.event_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "audit.event_name must not be empty".to_string(),
            ));
        }
        for (index, rule) in self.rules.iter().enumerate() {
            validate_rule(rule, &format!("rules[{index}]"))?;
        }
        Ok(())
    }

    /// Builds the controller for these rules.
    pub fn controller(&self) -> AccessController {
        let controller = AccessController::new(self.rules.iter().cloned());
        if self.audit.enabled {
            controller
        } else {
            controller.without_audit()
        }
    }

    /// Builds the denial reporter for the configured event name.
    pub fn reporter(&self) -> DenialReporter {
        DenialReporter::new(self.audit.event_name.as_str())
    }
}

fn validate_rule(rule: &Rule, at: &str) -> Result<(), ConfigError> {
    let invalid = |what: &str| ConfigError::ValidationError(format!("{at}: {what}"));

    match rule {
        Rule::OrganizationEquals(value)
        | Rule::OrgUnitEquals(value)
        | Rule::RoleEquals(value)
        | Rule::HasAttribute(value)
        | Rule::Attribute { name: value, .. } => {
            if value.is_empty() {
                return Err(invalid(&format!("{} requires a non-empty value", rule.kind())));
            }
        }
        Rule::OrganizationIn(values) | Rule::OrgUnitIn(values) | Rule::RoleIn(values) => {
            if values.is_empty() {
                return Err(invalid(&format!("{} requires at least one value", rule.kind())));
            }
            if values.iter().any(String::is_empty) {
                return Err(invalid(&format!("{} contains an empty value", rule.kind())));
            }
        }
        Rule::Or(children) if children.is_empty() => {
            warn!(rule = %at, "OR rule without children always denies");
        }
        Rule::And(children) | Rule::Or(children) => {
            for (index, child) in children.iter().enumerate() {
                validate_rule(child, &format!("{at}.{}[{index}]", rule.kind()))?;
            }
        }
        Rule::Not(child) => validate_rule(child, &format!("{at}.not"))?,
        Rule::PlatformAdmin | Rule::PlatformClient | Rule::Custom(_) | Rule::AlwaysDeny(_) => {}
    }
    Ok(())
}

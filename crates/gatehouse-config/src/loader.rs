//! Policy loader with multi-source merging
//!
//! Tables such as `[audit]` merge key by key across layers. Arrays do not:
//! the last file that defines `rules` replaces the whole list from earlier
//! layers, so a `gatehouse.local.toml` with its own `[[rules]]` drops every
//! project rule. The loader logs a warning when that happens.

use crate::{Paths, PolicyConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Policy loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user: bool,
}

impl ConfigLoader {
    /// Create a new loader rooted at the current directory
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "GATEHOUSE".to_string(),
            include_user: true,
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "GATEHOUSE")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/gatehouse/policy.toml
    pub fn without_user_policy(mut self) -> Self {
        self.include_user = false;
        self
    }

    /// Load and validate the policy from all sources with proper precedence
    pub fn load(self) -> Result<PolicyConfig> {
        let mut builder = config::Config::builder();
        let mut rule_files = Vec::new();

        // 1. Built-in defaults
        let defaults = PolicyConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User policy (~/.config/gatehouse/policy.toml)
        if self.include_user {
            if let Ok(user_file) = Paths::new().user_policy_file() {
                if user_file.exists() {
                    if defines_rules(&user_file) {
                        rule_files.push(user_file.clone());
                    }
                    builder = builder.add_source(
                        config::File::from(user_file)
                            .required(false)
                            .format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // 3. Project policy (gatehouse.toml)
        let project_file = Paths::project_policy_file(&self.project_dir);
        if project_file.exists() {
            if defines_rules(&project_file) {
                rule_files.push(project_file.clone());
            }
            builder = builder.add_source(
                config::File::from(project_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local overrides (gatehouse.local.toml, gitignored)
        let local_file = Paths::local_policy_file(&self.project_dir);
        if local_file.exists() {
            if defines_rules(&local_file) {
                rule_files.push(local_file.clone());
            }
            builder = builder.add_source(
                config::File::from(local_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (GATEHOUSE_AUDIT__ENABLED=false)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some((winner, replaced)) = rule_files.split_last() {
            if !replaced.is_empty() {
                warn!(
                    winner = %winner.display(),
                    replaced = ?replaced,
                    "policy rules replaced by a later layer"
                );
            }
        }

        let config = builder.build().context("Failed to build policy configuration")?;

        let policy: PolicyConfig = config
            .try_deserialize()
            .context("Failed to deserialize policy configuration")?;

        policy.validate()?;
        Ok(policy)
    }
}

/// Whether a policy file sets `rules`. Unreadable files are left to the
/// config builder to report.
fn defines_rules(path: &Path) -> bool {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.parse::<toml::Table>().ok())
        .is_some_and(|table| table.contains_key("rules"))
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse::{Rule, StaticIdentity};
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("GATEHOUSE_LOADER_TEST")
            .without_user_policy()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let policy = loader(temp_dir.path()).load().expect("Failed to load policy");

        assert!(policy.rules.is_empty());
        assert!(policy.audit.enabled);
        assert_eq!(policy.audit.event_name, "AccessDenied");
    }

    #[test]
    fn test_load_project_policy() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("gatehouse.toml"),
            r#"
[audit]
enabled = false

[[rules]]
organization_equals = "Org1MSP"

[[rules]]
role_in = ["admin", "operator"]
"#,
        )
        .expect("Failed to write policy");

        let policy = loader(temp_dir.path()).load().expect("Failed to load policy");

        assert!(!policy.audit.enabled);
        assert_eq!(policy.rules.len(), 2);

        let controller = policy.controller();
        let operator = StaticIdentity::new("Org1MSP").with_role("operator");
        assert!(controller.check(&operator).is_ok());
        let guest = StaticIdentity::new("Org1MSP").with_role("guest");
        assert!(controller.check(&guest).is_err());
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("gatehouse.toml"),
            r#"
[audit]
event_name = "ProjectDenied"
"#,
        )
        .expect("Failed to write project policy");

        fs::write(
            project_dir.join("gatehouse.local.toml"),
            r#"
[audit]
event_name = "LocalDenied"
"#,
        )
        .expect("Failed to write local policy");

        let policy = loader(project_dir).load().expect("Failed to load policy");

        assert_eq!(policy.audit.event_name, "LocalDenied");
    }

    #[test]
    fn test_local_rules_replace_project_rules() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("gatehouse.toml"),
            r#"
[[rules]]
organization_equals = "Org1MSP"

[[rules]]
role_equals = "admin"
"#,
        )
        .expect("Failed to write project policy");
        fs::write(
            project_dir.join("gatehouse.local.toml"),
            r#"
[[rules]]
has_attribute = "dept"
"#,
        )
        .expect("Failed to write local policy");

        assert!(defines_rules(&project_dir.join("gatehouse.toml")));
        assert!(defines_rules(&project_dir.join("gatehouse.local.toml")));

        let policy = loader(project_dir).load().expect("Failed to load policy");
        assert_eq!(policy.rules.len(), 1);
        assert!(matches!(&policy.rules[0], Rule::HasAttribute(name) if name == "dept"));
    }

    #[test]
    fn test_defines_rules_ignores_other_tables() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("gatehouse.local.toml");
        fs::write(&path, "[audit]\nenabled = false\n").expect("Failed to write policy");

        assert!(!defines_rules(&path));
        assert!(!defines_rules(&temp_dir.path().join("missing.toml")));
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("gatehouse.toml"),
            r#"
[[rules]]
role_equals = ""
"#,
        )
        .expect("Failed to write policy");

        let err = loader(temp_dir.path()).load().unwrap_err();
        assert!(err.to_string().contains("role_equals requires a non-empty value"));
    }
}

//! Policy file locations

use crate::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// XDG-compliant paths for gatehouse policy files
pub struct Paths {
    project_dirs: Option<ProjectDirs>,
}

impl Paths {
    pub fn new() -> Self {
        Self {
            project_dirs: ProjectDirs::from("dev", "Gatehouse", "gatehouse"),
        }
    }

    /// User policy file (~/.config/gatehouse/policy.toml)
    pub fn user_policy_file(&self) -> Result<PathBuf, ConfigError> {
        self.project_dirs
            .as_ref()
            .map(|p| p.config_dir().join("policy.toml"))
            .ok_or_else(|| {
                ConfigError::XdgError("Failed to determine user config directory".to_string())
            })
    }

    /// Project policy file (gatehouse.toml)
    pub fn project_policy_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("gatehouse.toml")
    }

    /// Local overrides (gatehouse.local.toml, gitignored)
    pub fn local_policy_file(project_dir: impl AsRef<Path>) -> PathBuf {
        project_dir.as_ref().join("gatehouse.local.toml")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

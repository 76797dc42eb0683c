use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::options::Options;

/// Describes the program to register with the service manager.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Service name used by the manager (unit name, label, SCM key)
    pub name: String,

    /// Human readable name, falls back to `name`
    #[serde(default)]
    pub display_name: String,

    #[serde(default)]
    pub description: String,

    /// Account the service runs as, empty for the manager's default
    #[serde(default)]
    pub user_name: String,

    /// Executable to launch, defaults to the running binary
    #[serde(default)]
    pub executable: Option<PathBuf>,

    /// Arguments passed to the executable when the manager starts it
    #[serde(default)]
    pub arguments: Vec<String>,

    #[serde(default)]
    pub working_directory: Option<PathBuf>,

    /// Services that must be up first (systemd/sysv/rc.d only)
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub options: Options,
}

impl Config {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Load config from a JSON file path
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read service config from {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&data).with_context(|| "failed to parse service config JSON")?;
        Ok(config)
    }

    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }
}

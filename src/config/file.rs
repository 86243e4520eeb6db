//! Configuration file management
//!
//! Handles finding, loading, and saving runner configuration files.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::{is_yaml_file, OutputOptions, RunnerConfig};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./harness-multi.json",
    "./harness-multi.yaml",
    "./harness-multi.yml",
    "./.harness-multi.yaml",
    "~/.config/harness-multi/config.yaml",
];

/// A runner configuration together with the file it was loaded from.
#[derive(Clone, Debug)]
pub struct ConfigFile {
    pub path: Option<PathBuf>,
    pub config: RunnerConfig,
}

impl ConfigFile {
    /// Find a configuration file in the standard locations.
    pub fn find() -> Option<PathBuf> {
        for location in CONFIG_LOCATIONS {
            let path = expand_path(location);
            if path.exists() {
                return Some(path);
            }
        }
        None
    }

    /// Load from the first discovered location, or fall back to defaults.
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(path),
            None => Ok(Self {
                path: None,
                config: RunnerConfig::default(),
            }),
        }
    }

    /// Load from an explicit path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config = super::load(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            config,
        })
    }

    /// Save the configuration to a file, JSON or YAML by extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(&self.config).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(&self.config).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Generate an example configuration.
    pub fn example() -> RunnerConfig {
        RunnerConfig {
            pool_size: 2,
            files: vec!["test/a.js".to_string(), "test/b.js".to_string()],
            browser_files: vec!["test/b.js".to_string()],
            browser: Some("chrome".to_string()),
            output: OutputOptions {
                pass: true,
                fail: true,
                coverage: None,
                bail_out: false,
            },
            ..Default::default()
        }
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

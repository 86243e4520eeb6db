//! Configuration module
//!
//! Runner configuration: pool size, suite files, lane membership, launcher
//! names, output options, and the pass-through base options handed to the
//! external harness.

#![allow(dead_code)]

mod file;

pub use file::ConfigFile;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::models::{Lane, Task};

/// Launcher used for default-lane tasks when none is configured.
pub const DEFAULT_LAUNCHER: &str = "phantomjs";

/// Top-level runner configuration.
///
/// Unknown keys are collected into `base` and overlaid verbatim into each
/// per-run harness configuration artifact.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum number of concurrently running tasks across both lanes.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Suite files, one task each. Empty means one synthetic task that runs
    /// the harness once with no suite override.
    #[serde(default)]
    pub files: Vec<String>,

    /// Files routed to the exclusive lane.
    #[serde(default, alias = "browserFiles")]
    pub browser_files: Vec<String>,

    /// Exclusive-lane launcher name.
    #[serde(default)]
    pub browser: Option<String>,

    /// Default-lane launcher name.
    #[serde(default = "default_launcher")]
    pub launcher: String,

    /// Harness invocation settings.
    #[serde(default)]
    pub harness: HarnessCommand,

    /// Report output options.
    #[serde(default)]
    pub output: OutputOptions,

    /// Remaining keys: the base harness configuration every run inherits.
    #[serde(flatten)]
    pub base: Map<String, Value>,
}

fn default_pool_size() -> usize {
    4
}

fn default_launcher() -> String {
    DEFAULT_LAUNCHER.to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            files: Vec::new(),
            browser_files: Vec::new(),
            browser: None,
            launcher: default_launcher(),
            harness: HarnessCommand::default(),
            output: OutputOptions::default(),
            base: Map::new(),
        }
    }
}

impl RunnerConfig {
    /// Validate invariants that would otherwise surface as programming
    /// errors mid-orchestration.
    pub fn validate(&self) -> Result<()> {
        if self.pool_size == 0 {
            anyhow::bail!("pool_size must be at least 1");
        }
        if !self.browser_files.is_empty() && self.browser.is_none() {
            anyhow::bail!("browserFiles configured but no browser launcher set");
        }
        if self.harness.program.is_empty() {
            anyhow::bail!("harness.program must not be empty");
        }
        Ok(())
    }

    /// Lane membership for one suite path.
    pub fn lane_for(&self, suite: &str) -> Lane {
        if self.browser_files.iter().any(|f| f == suite) {
            Lane::Exclusive
        } else {
            Lane::Default
        }
    }

    /// Launcher name for a lane.
    pub fn launcher_for(&self, lane: Lane) -> &str {
        match lane {
            Lane::Exclusive => self.browser.as_deref().unwrap_or(&self.launcher),
            Lane::Default => &self.launcher,
        }
    }

    /// Build the task set: one task per suite file, classified by lane, or
    /// a single synthetic empty-path task when no files are given.
    pub fn tasks(&self) -> Vec<Task> {
        let files: Vec<String> = if self.files.is_empty() {
            vec![String::new()]
        } else {
            self.files.clone()
        };

        files
            .into_iter()
            .map(|suite| {
                let lane = self.lane_for(&suite);
                let launcher = self.launcher_for(lane).to_string();
                Task::new(suite, lane, launcher)
            })
            .collect()
    }

    /// Build the per-run harness configuration for one task.
    ///
    /// A `.json` suite path is merged as a JSON overlay onto the base
    /// options; any other non-empty path becomes a `test_page` override of
    /// the form `<path>#testem`. The assigned port and the lane's launcher
    /// are always injected.
    pub fn run_config(&self, suite: &str, port: u16, launcher: &str) -> Result<Value> {
        let mut options = self.base.clone();

        if suite.ends_with(".json") {
            let content = std::fs::read_to_string(suite)
                .with_context(|| format!("Failed to read suite overlay: {suite}"))?;
            let overlay: Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse suite overlay: {suite}"))?;
            if let Value::Object(map) = overlay {
                options.extend(map);
            } else {
                anyhow::bail!("Suite overlay is not a JSON object: {suite}");
            }
        } else if !suite.is_empty() {
            options.insert(
                "test_page".to_string(),
                Value::String(format!("{suite}#testem")),
            );
        }

        options.insert("port".to_string(), Value::from(port));
        options.insert(
            "launch_in_ci".to_string(),
            Value::Array(vec![Value::String(launcher.to_string())]),
        );

        if let Some(coverage) = &self.output.coverage {
            options.insert("coverage".to_string(), Value::String(coverage.clone()));
        }

        Ok(Value::Object(options))
    }
}

/// How to invoke the external harness.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HarnessCommand {
    /// Executable name or path.
    #[serde(default = "default_program")]
    pub program: String,

    /// Leading arguments placed before the generated `--file`/`--port` pair.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
}

fn default_program() -> String {
    "testem".to_string()
}

fn default_args() -> Vec<String> {
    vec!["ci".to_string()]
}

impl Default for HarnessCommand {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
        }
    }
}

/// Report output options.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Include passing cases in the rendered report.
    #[serde(default = "default_true")]
    pub pass: bool,

    /// Include failing cases in the rendered report.
    #[serde(default = "default_true")]
    pub fail: bool,

    /// Coverage output directory; `false` or absent disables coverage.
    /// Consumed by the harness's coverage hook, not by the orchestrator.
    #[serde(default, deserialize_with = "coverage_field")]
    pub coverage: Option<String>,

    /// Skip every not-yet-started task after the first failing run.
    #[serde(default, alias = "bailOut")]
    pub bail_out: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            pass: true,
            fail: true,
            coverage: None,
            bail_out: false,
        }
    }
}

/// Accepts `"path"`, `false`, or null for the coverage option.
fn coverage_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Disabled(bool),
        Path(String),
    }

    Ok(match Option::<Field>::deserialize(deserializer)? {
        Some(Field::Path(path)) => Some(path),
        Some(Field::Disabled(_)) | None => None,
    })
}

/// Load a runner configuration from a JSON or YAML file.
pub fn load(path: impl AsRef<Path>) -> Result<RunnerConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: RunnerConfig = if is_yaml_file(path) {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
    } else {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
    };

    config.validate()?;
    Ok(config)
}

/// Check if file is YAML based on extension
pub(crate) fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

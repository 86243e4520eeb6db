//! External harness collaborator
//!
//! The orchestrator never runs test suites itself; it drives a harness
//! through this seam. `ProcessHarness` spawns the configured harness
//! command and translates its TAP stdout into events.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::HarnessCommand;

/// Harness invocation errors
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Failed to start harness process: {0}")]
    Spawn(String),

    #[error("Harness I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Signals reported by a running harness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarnessEvent {
    /// One test case finished. Names are raw, without the suite prefix.
    Case { name: String, ok: bool },
    /// The suite finished with cumulative counts. Arrives independently of
    /// the harness invocation itself completing.
    SuiteFinished {
        tests: usize,
        pass: usize,
        fail: usize,
    },
}

/// The external harness seam.
///
/// `run` resolving and the `SuiteFinished` event are two independent
/// completion signals; the run executor joins both before releasing a
/// pool slot.
pub trait Harness: Send + Sync + 'static {
    /// Harness version string, shared by every run of one orchestration.
    fn version(&self) -> String;

    /// Execute one suite run described by the persisted config artifact.
    fn run(
        &self,
        config_path: &Path,
        port: u16,
        events: mpsc::UnboundedSender<HarnessEvent>,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;
}

/// Harness implementation that spawns an external process and reads its
/// TAP output line by line.
#[derive(Clone, Debug)]
pub struct ProcessHarness {
    command: HarnessCommand,
    version: String,
    coverage: Option<String>,
}

impl ProcessHarness {
    pub fn new(command: HarnessCommand) -> Self {
        Self {
            command,
            version: "unknown".to_string(),
            coverage: None,
        }
    }

    /// Coverage output directory, exposed to the harness through its
    /// environment. The orchestrator itself never touches coverage data.
    pub fn with_coverage(mut self, coverage: Option<String>) -> Self {
        self.coverage = coverage;
        self
    }

    /// Probe `<program> --version` once so every run can share the string.
    pub async fn detect_version(mut self) -> Self {
        let output = Command::new(&self.command.program)
            .arg("--version")
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                let version = String::from_utf8_lossy(&out.stdout).trim().to_string();
                if !version.is_empty() {
                    self.version = version;
                }
            }
            Ok(out) => {
                debug!("harness --version exited with {}", out.status);
            }
            Err(e) => {
                debug!("harness --version probe failed: {}", e);
            }
        }
        self
    }
}

impl Harness for ProcessHarness {
    fn version(&self) -> String {
        self.version.clone()
    }

    async fn run(
        &self,
        config_path: &Path,
        port: u16,
        events: mpsc::UnboundedSender<HarnessEvent>,
    ) -> Result<(), HarnessError> {
        let mut cmd = Command::new(&self.command.program);
        cmd.args(&self.command.args)
            .arg("--file")
            .arg(config_path)
            .arg("--port")
            .arg(port.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        if let Some(coverage) = &self.coverage {
            cmd.env("HARNESS_COVERAGE_DIR", coverage);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| HarnessError::Spawn(e.to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| HarnessError::Spawn("no stdout handle".to_string()))?;

        let mut lines = BufReader::new(stdout).lines();
        let mut pass = 0usize;
        let mut fail = 0usize;

        while let Some(line) = lines.next_line().await? {
            match parse_tap_line(&line) {
                Some(TapLine::Case { name, ok }) => {
                    if ok {
                        pass += 1;
                    } else {
                        fail += 1;
                    }
                    // The receiver may have given up; keep draining so the
                    // child is not blocked on a full pipe.
                    let _ = events.send(HarnessEvent::Case { name, ok });
                }
                Some(TapLine::Plan(_)) | None => {}
            }
        }

        let _ = events.send(HarnessEvent::SuiteFinished {
            tests: pass + fail,
            pass,
            fail,
        });

        let status = child.wait().await?;
        if !status.success() {
            // Failing suites legitimately exit non-zero; the result carries
            // the failures.
            warn!("harness exited with {}", status);
        }
        Ok(())
    }
}

/// A recognized TAP output line.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TapLine {
    Case { name: String, ok: bool },
    Plan(usize),
}

/// Parse one line of harness TAP output. Comments, diagnostics, and the
/// version header are ignored.
fn parse_tap_line(line: &str) -> Option<TapLine> {
    let line = line.trim_end();

    if let Some(rest) = line.strip_prefix("not ok") {
        if rest.is_empty() || rest.starts_with(' ') {
            return Some(TapLine::Case {
                name: case_name(rest),
                ok: false,
            });
        }
        return None;
    }
    if let Some(rest) = line.strip_prefix("ok") {
        // Require a delimiter so words like "okay" don't match.
        if rest.is_empty() || rest.starts_with(' ') {
            return Some(TapLine::Case {
                name: case_name(rest),
                ok: true,
            });
        }
        return None;
    }
    if let Some(rest) = line.strip_prefix("1..") {
        if let Ok(n) = rest.trim().parse::<usize>() {
            return Some(TapLine::Plan(n));
        }
    }
    None
}

/// Strip the optional test number from a case line remainder.
fn case_name(rest: &str) -> String {
    let rest = rest.trim_start();
    match rest.split_once(' ') {
        Some((first, tail)) if first.parse::<u64>().is_ok() => tail.trim_start().to_string(),
        _ => rest.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_passing_case() {
        assert_eq!(
            parse_tap_line("ok 1 adds numbers"),
            Some(TapLine::Case {
                name: "adds numbers".to_string(),
                ok: true,
            })
        );
    }

    #[test]
    fn test_parse_failing_case() {
        assert_eq!(
            parse_tap_line("not ok 2 divides by zero"),
            Some(TapLine::Case {
                name: "divides by zero".to_string(),
                ok: false,
            })
        );
    }

    #[test]
    fn test_parse_case_without_number() {
        assert_eq!(
            parse_tap_line("ok handles empty input"),
            Some(TapLine::Case {
                name: "handles empty input".to_string(),
                ok: true,
            })
        );
    }

    #[test]
    fn test_parse_plan() {
        assert_eq!(parse_tap_line("1..12"), Some(TapLine::Plan(12)));
    }

    #[test]
    fn test_ignores_noise() {
        assert_eq!(parse_tap_line("TAP version 13"), None);
        assert_eq!(parse_tap_line("# a comment"), None);
        assert_eq!(parse_tap_line("okay nope"), None);
        assert_eq!(parse_tap_line(""), None);
    }

    #[test]
    fn test_case_name_preserves_inner_spacing() {
        assert_eq!(case_name(" 3 keeps  double  spaces"), "keeps  double  spaces");
    }
}

//! Data models for suite orchestration
//!
//! Defines tasks, lanes, per-suite results, and progress events.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Scheduling lane a task belongs to.
///
/// `Exclusive` lane tasks may have at most one concurrently running
/// instance; `Default` lane tasks are bounded only by the pool size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Default,
    Exclusive,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::Default => write!(f, "default"),
            Lane::Exclusive => write!(f, "exclusive"),
        }
    }
}

/// Task lifecycle status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Skipped,
}

/// One schedulable unit: a single suite file bound to a lane and launcher.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Task {
    /// Suite file path. Empty means "run the harness once with no override".
    pub suite: String,
    pub lane: Lane,
    /// Launcher name for this lane (e.g. "phantomjs", "chrome").
    pub launcher: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn new(suite: impl Into<String>, lane: Lane, launcher: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            lane,
            launcher: launcher.into(),
            status: TaskStatus::Pending,
        }
    }

    /// Display name for suites, including the synthetic empty-path task.
    pub fn display_name(&self) -> &str {
        if self.suite.is_empty() {
            "(default)"
        } else {
            &self.suite
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} / {}]", self.display_name(), self.lane, self.launcher)
    }
}

/// Outcome of a single test case within one suite run.
///
/// The name is already prefixed with the suite path so identically-named
/// cases from different suites remain distinguishable.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseResult {
    pub name: String,
    pub ok: bool,
}

impl CaseResult {
    pub fn tap_line(&self, number: usize) -> String {
        if self.ok {
            format!("ok {} {}", number, self.name)
        } else {
            format!("not ok {} {}", number, self.name)
        }
    }
}

/// Result of one suite run, produced exactly once per task.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteResult {
    pub suite: String,
    pub launcher: String,
    /// Case outcomes in harness-reported order, names prefixed.
    pub cases: Vec<CaseResult>,
    pub tests: usize,
    pub pass: usize,
    pub fail: usize,
    /// Harness version string, shared by every run of one orchestration.
    pub version: String,
    pub skipped: bool,
    /// Comment lines to interleave into the TAP document (skip notices).
    pub comments: Vec<String>,
    /// Set when the harness invocation itself failed.
    pub error: Option<String>,
}

impl SuiteResult {
    /// A completed run with harness-reported counts.
    pub fn completed(
        suite: impl Into<String>,
        launcher: impl Into<String>,
        cases: Vec<CaseResult>,
        tests: usize,
        pass: usize,
        fail: usize,
        version: impl Into<String>,
    ) -> Self {
        Self {
            suite: suite.into(),
            launcher: launcher.into(),
            cases,
            tests,
            pass,
            fail,
            version: version.into(),
            skipped: false,
            comments: Vec::new(),
            error: None,
        }
    }

    /// A synthetic record for a task skipped by bail-out: zero cases,
    /// one comment line.
    pub fn bailed_out(suite: impl Into<String>, launcher: impl Into<String>) -> Self {
        let suite = suite.into();
        let comment = format!("# BAILED OUT: Skipping {suite}");
        Self {
            suite,
            launcher: launcher.into(),
            cases: Vec::new(),
            tests: 0,
            pass: 0,
            fail: 0,
            version: String::new(),
            skipped: true,
            comments: vec![comment],
            error: None,
        }
    }

    /// A record for a run whose harness invocation failed outright.
    pub fn errored(
        suite: impl Into<String>,
        launcher: impl Into<String>,
        cases: Vec<CaseResult>,
        error: impl Into<String>,
    ) -> Self {
        let pass = cases.iter().filter(|c| c.ok).count();
        let fail = cases.iter().filter(|c| !c.ok).count();
        Self {
            suite: suite.into(),
            launcher: launcher.into(),
            tests: cases.len(),
            pass,
            fail,
            cases,
            version: String::new(),
            skipped: false,
            comments: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn has_failure(&self) -> bool {
        self.fail > 0 || self.cases.iter().any(|c| !c.ok)
    }

    pub fn status(&self) -> TaskStatus {
        if self.skipped {
            TaskStatus::Skipped
        } else {
            TaskStatus::Done
        }
    }
}

/// Progress notifications emitted during orchestration.
///
/// Each variant renders as one human-readable line; the terminal report is
/// delivered separately through the orchestrator's return value.
#[derive(Clone, Debug)]
pub enum ProgressEvent {
    TaskStarted {
        suite: String,
    },
    TaskFinished {
        suite: String,
        running: usize,
        pending: usize,
    },
    Case {
        line: String,
    },
    Skipped {
        suite: String,
    },
    AccountingError {
        launcher: String,
    },
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::TaskStarted { suite } => {
                write!(f, "# Executing start {suite}")
            }
            ProgressEvent::TaskFinished {
                suite,
                running,
                pending,
            } => write!(
                f,
                "# Executing end {suite}. {running} tasks running and {pending} tasks pending."
            ),
            ProgressEvent::Case { line } => write!(f, "{line}"),
            ProgressEvent::Skipped { suite } => {
                write!(f, "# BAILED OUT: Skipping {suite}")
            }
            ProgressEvent::AccountingError { launcher } => {
                write!(f, "# accounting error: no running entry for launcher {launcher}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_display_name() {
        let task = Task::new("", Lane::Default, "phantomjs");
        assert_eq!(task.display_name(), "(default)");

        let task = Task::new("a.js", Lane::Exclusive, "chrome");
        assert_eq!(task.display_name(), "a.js");
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_case_tap_line() {
        let case = CaseResult {
            name: "a.js - adds numbers".to_string(),
            ok: true,
        };
        assert_eq!(case.tap_line(3), "ok 3 a.js - adds numbers");

        let case = CaseResult {
            name: "a.js - divides by zero".to_string(),
            ok: false,
        };
        assert_eq!(case.tap_line(4), "not ok 4 a.js - divides by zero");
    }

    #[test]
    fn test_suite_result_completed() {
        let cases = vec![
            CaseResult {
                name: "a.js - one".to_string(),
                ok: true,
            },
            CaseResult {
                name: "a.js - two".to_string(),
                ok: false,
            },
        ];
        let result = SuiteResult::completed("a.js", "phantomjs", cases, 2, 1, 1, "2.14.0");
        assert!(result.has_failure());
        assert_eq!(result.status(), TaskStatus::Done);
        assert_eq!(result.version, "2.14.0");
    }

    #[test]
    fn test_suite_result_bailed_out() {
        let result = SuiteResult::bailed_out("b.js", "chrome");
        assert!(result.skipped);
        assert!(result.cases.is_empty());
        assert_eq!(result.tests, 0);
        assert_eq!(result.comments, vec!["# BAILED OUT: Skipping b.js"]);
        assert_eq!(result.status(), TaskStatus::Skipped);
    }

    #[test]
    fn test_suite_result_errored_counts_partial_cases() {
        let cases = vec![CaseResult {
            name: "z.js - started".to_string(),
            ok: true,
        }];
        let result = SuiteResult::errored("z.js", "phantomjs", cases, "harness exited early");
        assert_eq!(result.tests, 1);
        assert_eq!(result.pass, 1);
        assert_eq!(result.fail, 0);
        assert!(result.error.is_some());
        assert!(!result.has_failure());
    }

    #[test]
    fn test_progress_event_lines() {
        let ev = ProgressEvent::TaskStarted {
            suite: "a.js".to_string(),
        };
        assert_eq!(ev.to_string(), "# Executing start a.js");

        let ev = ProgressEvent::TaskFinished {
            suite: "a.js".to_string(),
            running: 1,
            pending: 2,
        };
        assert_eq!(
            ev.to_string(),
            "# Executing end a.js. 1 tasks running and 2 tasks pending."
        );

        let ev = ProgressEvent::Skipped {
            suite: "y.js".to_string(),
        };
        assert_eq!(ev.to_string(), "# BAILED OUT: Skipping y.js");
    }
}

//! Result aggregation
//!
//! Accumulates per-suite results in completion order and renders the
//! merged structured report plus the renumbered TAP-v13 document.

#![allow(dead_code)]

use serde::Serialize;

use crate::config::OutputOptions;
use crate::models::SuiteResult;

/// Consumes `SuiteResult`s as runs complete.
#[derive(Debug)]
pub struct Aggregator {
    output: OutputOptions,
    results: Vec<SuiteResult>,
}

impl Aggregator {
    pub fn new(output: OutputOptions) -> Self {
        Self {
            output,
            results: Vec::new(),
        }
    }

    /// Record one completed (or skipped) run. Order of calls is completion
    /// order and is preserved in the final report.
    pub fn push(&mut self, result: SuiteResult) {
        self.results.push(result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Close the aggregation and compute the merged report.
    pub fn finalize(self) -> AggregateReport {
        let mut report = AggregateReport {
            tests: 0,
            pass: 0,
            fail: 0,
            version: String::new(),
            passed: Vec::new(),
            failed: Vec::new(),
            output: self.output,
            results: self.results,
        };

        for result in &report.results {
            report.tests += result.tests;
            report.pass += result.pass;
            report.fail += result.fail;
            // All runs share one harness binary; last non-empty wins.
            if !result.version.is_empty() {
                report.version = result.version.clone();
            }
            for case in &result.cases {
                if case.ok && report.output.pass {
                    report.passed.push(case.name.clone());
                } else if !case.ok && report.output.fail {
                    report.failed.push(case.name.clone());
                }
            }
        }

        report
    }
}

/// The merged outcome of a whole orchestration.
///
/// Counts reflect harness-reported totals; the `passed`/`failed` name lists
/// and the TAP case lines honor the `output.pass`/`output.fail` filters.
#[derive(Clone, Debug, Serialize)]
pub struct AggregateReport {
    pub tests: usize,
    pub pass: usize,
    pub fail: usize,
    pub version: String,
    pub passed: Vec<String>,
    pub failed: Vec<String>,
    #[serde(skip)]
    pub output: OutputOptions,
    /// Per-suite results in completion order.
    pub results: Vec<SuiteResult>,
}

impl AggregateReport {
    /// Render the TAP-v13 document.
    ///
    /// The plan line's count is only known once every run is in, so the
    /// body is built first and the header prepended afterwards. Case
    /// numbering is one contiguous sequence across the whole document.
    pub fn render_tap(&self) -> String {
        let mut body: Vec<String> = Vec::new();
        let mut number = 0usize;

        for result in &self.results {
            for comment in &result.comments {
                body.push(comment.clone());
            }
            for case in &result.cases {
                if case.ok && !self.output.pass {
                    continue;
                }
                if !case.ok && !self.output.fail {
                    continue;
                }
                number += 1;
                body.push(case.tap_line(number));
            }
        }

        let mut doc = Vec::with_capacity(body.len() + 2);
        doc.push("TAP version 13".to_string());
        doc.push(format!("1..{number}"));
        doc.extend(body);
        doc.join("\n")
    }
}

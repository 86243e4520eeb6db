//! Report formatters
//!
//! Renders the merged report as a summary table, JSON, or raw TAP.

use std::fmt::Write;

use crate::models::TaskStatus;
use crate::report::AggregateReport;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Tap,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "tap" => Some(OutputFormat::Tap),
            _ => None,
        }
    }
}

/// Report formatter
pub struct ResultFormatter {
    format: OutputFormat,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_report(&self, report: &AggregateReport) -> String {
        match self.format {
            OutputFormat::Table => self.format_table(report),
            OutputFormat::Json => {
                serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
            }
            OutputFormat::Tap => report.render_tap(),
        }
    }

    fn format_table(&self, report: &AggregateReport) -> String {
        let mut out = String::new();

        writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━").ok();
        for result in &report.results {
            let status = match result.status() {
                TaskStatus::Skipped => "SKIP",
                _ if result.error.is_some() => "ERROR",
                _ if result.fail > 0 => "FAIL",
                _ => "PASS",
            };
            let suite = if result.suite.is_empty() {
                "(default)"
            } else {
                result.suite.as_str()
            };
            writeln!(
                out,
                "  {:5} {:30} {:>3} tests | {:>3} pass | {:>3} fail  [{}]",
                status, suite, result.tests, result.pass, result.fail, result.launcher
            )
            .ok();
        }
        writeln!(out, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━").ok();
        writeln!(
            out,
            "Total: {} | Pass: {} | Fail: {}",
            report.tests, report.pass, report.fail
        )
        .ok();
        if !report.version.is_empty() {
            writeln!(out, "Harness version: {}", report.version).ok();
        }

        out
    }
}

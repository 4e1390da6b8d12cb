//! JSON output formatter

use super::OutputFormatter;
use crate::diagnostic::Diagnostic;
use crate::engine::ScanResult;
use crate::runner::EvaluationFailure;
use serde::Serialize;
use std::collections::BTreeMap;

/// JSON formatter for machine-readable output
#[derive(Default)]
pub struct JsonFormatter {
    /// Pretty print with indentation
    pub pretty: bool,
}

impl JsonFormatter {
    /// Create a new JSON formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable pretty printing
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    fn encode<T: Serialize>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value).unwrap_or_default()
        } else {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    diagnostics: Vec<JsonDiagnostic<'a>>,
    failures: &'a [EvaluationFailure],
    summary: JsonSummary,
}

#[derive(Serialize)]
struct JsonDiagnostic<'a> {
    check_id: &'a str,
    severity: String,
    issue_type: String,
    message: &'a str,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    line: Option<usize>,
    #[serde(skip_serializing_if = "no_extra")]
    extra: &'a BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<&'a str>,
}

fn no_extra(extra: &&BTreeMap<String, String>) -> bool {
    extra.is_empty()
}

impl<'a> From<&'a Diagnostic> for JsonDiagnostic<'a> {
    fn from(d: &'a Diagnostic) -> Self {
        Self {
            check_id: &d.check_id,
            severity: d.severity.to_string(),
            issue_type: d.issue_type.to_string(),
            message: &d.message,
            path: &d.location.path,
            line: d.location.line,
            extra: &d.extra,
            help: d.help.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct JsonSummary {
    targets_checked: usize,
    counts: BTreeMap<String, usize>,
    failure_count: usize,
    cancelled: bool,
    duration_ms: u128,
}

impl OutputFormatter for JsonFormatter {
    fn format(&self, result: &ScanResult) -> String {
        let output = JsonOutput {
            diagnostics: result.diagnostics.iter().map(JsonDiagnostic::from).collect(),
            failures: &result.failures,
            summary: JsonSummary {
                targets_checked: result.targets_checked,
                counts: result
                    .counts
                    .iter()
                    .map(|(severity, n)| (severity.to_string(), *n))
                    .collect(),
                failure_count: result.failures.len(),
                cancelled: result.cancelled,
                duration_ms: result.duration.as_millis(),
            },
        };
        self.encode(&output)
    }

    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String {
        self.encode(&JsonDiagnostic::from(diagnostic))
    }
}

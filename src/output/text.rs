//! Human-readable text output formatter

use super::OutputFormatter;
use crate::diagnostic::{Diagnostic, Severity};
use crate::engine::ScanResult;
use colored::*;

/// Text formatter with optional color support
pub struct TextFormatter {
    /// Enable colored output
    pub colored: bool,

    /// Show help text
    pub show_help: bool,

    /// Show extra info entries
    pub show_extra: bool,

    /// Show statistics
    pub show_stats: bool,
}

impl Default for TextFormatter {
    fn default() -> Self {
        Self {
            colored: true,
            show_help: true,
            show_extra: true,
            show_stats: true,
        }
    }
}

impl TextFormatter {
    /// Create a new text formatter
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable colors
    pub fn without_color(mut self) -> Self {
        self.colored = false;
        self
    }

    fn severity_str(&self, severity: Severity) -> ColoredString {
        let s = format!("{}", severity);
        if !self.colored {
            return s.normal();
        }
        match severity {
            Severity::Blocker | Severity::Critical => s.red().bold(),
            Severity::Major => s.red(),
            Severity::Minor => s.yellow().bold(),
            Severity::Info => s.blue(),
        }
    }

    fn paint(&self, text: &str, paint: fn(&str) -> ColoredString) -> String {
        if self.colored {
            paint(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_location(&self, diag: &Diagnostic) -> String {
        match diag.location.line {
            Some(line) => format!("{}:{}", diag.location.path, line),
            None => diag.location.path.clone(),
        }
    }
}

impl OutputFormatter for TextFormatter {
    fn format(&self, result: &ScanResult) -> String {
        let mut output = String::new();

        // Group diagnostics by check, keeping first-seen order
        let mut groups: Vec<(&str, Vec<&Diagnostic>)> = Vec::new();
        for diag in &result.diagnostics {
            match groups.iter_mut().find(|(id, _)| *id == diag.check_id) {
                Some((_, diags)) => diags.push(diag),
                None => groups.push((diag.check_id.as_str(), vec![diag])),
            }
        }

        for (check_id, diagnostics) in &groups {
            output.push_str(&format!("{}\n", self.paint(check_id, |s| s.underline())));
            for diag in diagnostics {
                output.push_str(&self.format_diagnostic(diag));
            }
            output.push('\n');
        }

        if self.show_stats {
            output.push_str(&format!(
                "{} {} checked",
                result.targets_checked,
                if result.targets_checked == 1 {
                    "target"
                } else {
                    "targets"
                }
            ));

            let counts: Vec<String> = Severity::ALL
                .iter()
                .rev()
                .filter_map(|&severity| {
                    let n = result.count(severity);
                    (n > 0).then(|| {
                        let s = format!("{} {}", n, severity);
                        if !self.colored {
                            return s;
                        }
                        match severity {
                            Severity::Blocker | Severity::Critical | Severity::Major => {
                                s.red().to_string()
                            }
                            Severity::Minor => s.yellow().to_string(),
                            Severity::Info => s.blue().to_string(),
                        }
                    })
                })
                .collect();

            if !counts.is_empty() {
                output.push_str(&format!(": {}", counts.join(", ")));
            }
            output.push('\n');

            if result.has_failures() {
                output.push_str(&format!(
                    "{} check evaluation(s) failed\n",
                    result.failures.len()
                ));
            }
            if result.cancelled {
                output.push_str("Cancelled before completion\n");
            }

            output.push_str(&format!(
                "Finished in {:.2}s\n",
                result.duration.as_secs_f64()
            ));
        }

        output
    }

    fn format_diagnostic(&self, diag: &Diagnostic) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "{}: {}[{}]: {}\n",
            self.format_location(diag),
            self.severity_str(diag.severity),
            self.paint(&diag.check_id, |s| s.cyan()),
            diag.message
        ));

        if self.show_extra {
            for (key, value) in &diag.extra {
                output.push_str(&format!(
                    "   {} {}: {}\n",
                    self.paint("=", |s| s.blue()),
                    key,
                    value
                ));
            }
        }

        if self.show_help {
            if let Some(help) = &diag.help {
                output.push_str(&format!(
                    "   {} help: {}\n",
                    self.paint("=", |s| s.blue()),
                    help
                ));
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::Location;
    use crate::model::{Graph, NodeKind};

    fn location() -> Location {
        let mut graph = Graph::new();
        let form = graph.add_root(NodeKind::Form);
        Location::new(form, "form 'Products' / table 'List'")
    }

    #[test]
    fn test_format_diagnostic() {
        let formatter = TextFormatter::new().without_color();
        let diag = Diagnostic::new(
            "form-list-field-ref-not-added",
            Severity::Minor,
            "The Ref field is not added to dynamic list",
            location(),
        )
        .with_help("Add the Ref field");

        let output = formatter.format_diagnostic(&diag);
        assert!(output.contains("form 'Products' / table 'List'"));
        assert!(output.contains("minor"));
        assert!(output.contains("[form-list-field-ref-not-added]"));
        assert!(output.contains("help: Add the Ref field"));
    }

    #[test]
    fn test_format_diagnostic_with_line() {
        let formatter = TextFormatter::new().without_color();
        let mut diag = Diagnostic::new("self-reference", Severity::Minor, "msg", location().with_line(6));
        diag.extra.insert("line".to_string(), "6".to_string());

        let output = formatter.format_diagnostic(&diag);
        assert!(output.starts_with("form 'Products' / table 'List':6: "));
        assert!(output.contains("line: 6"));
    }

    #[test]
    fn test_format_result() {
        let formatter = TextFormatter::new().without_color();
        let diag = Diagnostic::new("test", Severity::Minor, "Test", location());
        let mut result = ScanResult {
            diagnostics: vec![diag],
            targets_checked: 1,
            ..Default::default()
        };
        result.counts.insert(Severity::Minor, 1);

        let output = formatter.format(&result);
        assert!(output.contains("1 target checked"));
        assert!(output.contains("1 minor"));
    }
}

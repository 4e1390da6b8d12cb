//! Output formatters for scan results

mod json;
mod text;

pub use json::JsonFormatter;
pub use text::TextFormatter;

use crate::config::{ColorMode, OutputConfig, OutputFormat};
use crate::diagnostic::Diagnostic;
use crate::engine::ScanResult;

/// Output formatter trait
pub trait OutputFormatter: Send + Sync {
    /// Format the entire scan result
    fn format(&self, result: &ScanResult) -> String;

    /// Format a single diagnostic
    fn format_diagnostic(&self, diagnostic: &Diagnostic) -> String;
}

/// Formatter selected by the output configuration
pub fn formatter_for(config: &OutputConfig, is_terminal: bool) -> Box<dyn OutputFormatter> {
    match config.format {
        OutputFormat::Json => Box::new(JsonFormatter::new().pretty()),
        OutputFormat::Text => {
            let colored = match config.color {
                ColorMode::Always => true,
                ColorMode::Never => false,
                ColorMode::Auto => is_terminal,
            };
            let mut formatter = TextFormatter::new();
            formatter.colored = colored;
            formatter.show_stats = config.statistics;
            formatter.show_help = config.verbose;
            Box::new(formatter)
        }
    }
}

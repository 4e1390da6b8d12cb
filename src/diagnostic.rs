//! Diagnostic types for check results

use crate::check::{Issue, IssueType, EXTRA_LINE_KEY};
use crate::model::{Graph, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Severity level for issues
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,
    /// Minor style issue
    #[default]
    Minor,
    /// Likely problem worth fixing
    Major,
    /// Definite problem
    Critical,
    /// Must be fixed before release
    Blocker,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Minor,
        Severity::Major,
        Severity::Critical,
        Severity::Blocker,
    ];
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Minor => write!(f, "minor"),
            Severity::Major => write!(f, "major"),
            Severity::Critical => write!(f, "critical"),
            Severity::Blocker => write!(f, "blocker"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" | "hint" | "note" => Ok(Severity::Info),
            "minor" | "warning" | "warn" => Ok(Severity::Minor),
            "major" => Ok(Severity::Major),
            "critical" | "error" | "err" => Ok(Severity::Critical),
            "blocker" => Ok(Severity::Blocker),
            _ => Err(()),
        }
    }
}

/// Where an issue points in the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Node the issue is attached to
    pub node: NodeId,
    /// Containment path of the node (e.g. `form 'Orders' / table 'List'`)
    pub path: String,
    /// Source line, when the issue carries one
    pub line: Option<usize>,
}

impl Location {
    pub fn new(node: NodeId, path: &str) -> Self {
        Self {
            node,
            path: path.to_string(),
            line: None,
        }
    }

    /// Locate a node of the graph
    pub fn of(graph: &Graph, node: NodeId) -> Self {
        Self::new(node, &graph.describe(node))
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

/// An issue enriched with the check's metadata, ready for output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Check that reported this issue
    pub check_id: String,
    /// Effective severity (default or configured override)
    pub severity: Severity,
    /// Issue category of the check
    pub issue_type: IssueType,
    /// Human-readable message
    pub message: String,
    /// Model location
    pub location: Location,
    /// Structured extra info carried by the issue
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    /// Help text (usually the check description)
    pub help: Option<String>,
}

impl Diagnostic {
    pub fn new(check_id: &str, severity: Severity, message: &str, location: Location) -> Self {
        Self {
            check_id: check_id.to_string(),
            severity,
            issue_type: IssueType::default(),
            message: message.to_string(),
            location,
            extra: BTreeMap::new(),
            help: None,
        }
    }

    /// Build a diagnostic from an accepted issue
    pub fn from_issue(graph: &Graph, check_id: &str, severity: Severity, issue: &Issue) -> Self {
        let mut location = Location::of(graph, issue.node());
        if let Some(line) = issue
            .extra_value(EXTRA_LINE_KEY)
            .and_then(|l| l.parse::<usize>().ok())
        {
            location = location.with_line(line);
        }
        Self {
            extra: issue.extra().clone(),
            ..Self::new(check_id, severity, issue.message(), location)
        }
    }

    pub fn with_issue_type(mut self, issue_type: IssueType) -> Self {
        self.issue_type = issue_type;
        self
    }

    /// Add help text
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    /// At least major
    pub fn is_significant(&self) -> bool {
        self.severity >= Severity::Major
    }
}

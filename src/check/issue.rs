//! Issues and the result acceptor checks report through

use crate::model::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extra info key carrying the 1-based source line of an issue
pub const EXTRA_LINE_KEY: &str = "line";

/// A single finding, attached to one node
///
/// Issues are immutable once handed to an acceptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    node: NodeId,
    message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    extra: BTreeMap<String, String>,
}

impl Issue {
    pub fn new(node: NodeId, message: &str) -> Self {
        Self {
            node,
            message: message.to_string(),
            extra: BTreeMap::new(),
        }
    }

    /// Attach a structured extra info entry
    pub fn with_extra(mut self, key: &str, value: impl ToString) -> Self {
        self.extra.insert(key.to_string(), value.to_string());
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn extra(&self) -> &BTreeMap<String, String> {
        &self.extra
    }

    pub fn extra_value(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }
}

/// Sink for issues reported by a check
///
/// Append-only: call order is preserved and nothing is deduplicated.
pub trait ResultAcceptor {
    fn add_issue(&mut self, issue: Issue);
}

/// Default acceptor, collecting issues in call order
#[derive(Debug, Default)]
pub struct IssueCollector {
    issues: Vec<Issue>,
}

impl IssueCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn into_issues(self) -> Vec<Issue> {
        self.issues
    }
}

impl ResultAcceptor for IssueCollector {
    fn add_issue(&mut self, issue: Issue) {
        self.issues.push(issue);
    }
}

impl ResultAcceptor for Vec<Issue> {
    fn add_issue(&mut self, issue: Issue) {
        self.push(issue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Graph, NodeKind};

    #[test]
    fn test_collector_keeps_order_and_duplicates() {
        let mut graph = Graph::new();
        let a = graph.add_root(NodeKind::Form);
        let b = graph.add_root(NodeKind::Form);

        let mut collector = IssueCollector::new();
        collector.add_issue(Issue::new(b, "second"));
        collector.add_issue(Issue::new(a, "first"));
        collector.add_issue(Issue::new(a, "first"));

        let messages: Vec<_> = collector.issues().iter().map(Issue::message).collect();
        assert_eq!(messages, vec!["second", "first", "first"]);
        assert_eq!(collector.len(), 3);
    }

    #[test]
    fn test_extra_info() {
        let mut graph = Graph::new();
        let node = graph.add_root(NodeKind::Module);
        let issue = Issue::new(node, "msg").with_extra(EXTRA_LINE_KEY, 6);
        assert_eq!(issue.extra_value("line"), Some("6"));
        assert_eq!(issue.extra_value("column"), None);
    }
}
